// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: pipeline  —  one build, one immutable config
// ─────────────────────────────────────────────────────────────────────────────

use std::path::PathBuf;

use crate::command::CompileOptions;
use crate::config::{resolve, BuildConfig, BuildContext};
use crate::error::Result;
use crate::process::{ProcessRunner, StdioMode, SystemRunner};
use crate::stage::{self, BinaryImage, CompiledObjects, LinkedImage, StaticLibrary};

/// Everything `Pipeline::build` needs besides the config.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub sources:     Vec<PathBuf>,
    pub compile:     CompileOptions,
    pub ldflags:     Vec<String>,
    pub libflags:    Vec<String>,
    /// Sources whose objects go into `libmain.a`. `None` skips the archive.
    pub archive:     Option<Vec<PathBuf>>,
}

/// Artifacts of a full build.
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub objects: CompiledObjects,
    pub elf:     LinkedImage,
    pub library: Option<StaticLibrary>,
    pub hex:     BinaryImage,
}

pub struct Pipeline<R: ProcessRunner = SystemRunner> {
    config: BuildConfig,
    runner: R,
}

impl Pipeline<SystemRunner> {
    /// Resolve `ctx` and run stages with real processes.
    pub fn new(ctx: BuildContext) -> Result<Self> {
        Ok(Self::with_runner(resolve(ctx)?, SystemRunner))
    }
}

impl<R: ProcessRunner> Pipeline<R> {
    pub fn with_runner(config: BuildConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn compile(&self, sources: &[PathBuf], opts: &CompileOptions) -> Result<CompiledObjects> {
        stage::compile::run(&self.config, &self.runner, sources, opts)
    }

    pub fn link(
        &self,
        compiled: &CompiledObjects,
        extra_flags: &[String],
        extra_libs: &[String],
    ) -> Result<LinkedImage> {
        stage::link::run(&self.config, &self.runner, compiled, extra_flags, extra_libs)
    }

    pub fn archive(&self, sources: &[PathBuf]) -> Result<StaticLibrary> {
        stage::archive::run(&self.config, &self.runner, sources)
    }

    pub fn convert(&self, elf: &LinkedImage) -> Result<BinaryImage> {
        stage::convert::run(&self.config, &self.runner, elf)
    }

    pub fn flash(&self, image: &BinaryImage, port: &str, baud: Option<u32>, mode: StdioMode) -> Result<()> {
        stage::flash::run(&self.config, &self.runner, image, port, baud, mode)
    }

    /// The image a previous build left behind, for flash-only runs.
    pub fn existing_image(&self) -> Result<BinaryImage> {
        BinaryImage::existing(&self.config)
    }

    /// The ELF a previous link left behind, for convert-only runs.
    pub fn existing_elf(&self) -> Result<LinkedImage> {
        LinkedImage::existing(&self.config)
    }

    /// compile → link → archive (optional) → convert
    pub fn build(&self, plan: &BuildPlan) -> Result<BuildArtifacts> {
        let objects = self.compile(&plan.sources, &plan.compile)?;
        let elf     = self.link(&objects, &plan.ldflags, &plan.libflags)?;
        let library = match &plan.archive {
            Some(members) => Some(self.archive(members)?),
            None          => None,
        };
        let hex = self.convert(&elf)?;

        Ok(BuildArtifacts { objects, elf, library, hex })
    }
}
