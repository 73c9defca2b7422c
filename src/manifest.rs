// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: manifest  —  `firmforge.toml` project file
//
//      [board]
//      name            = "uno"
//      arch            = "AVR_UNO"
//      mcu             = "atmega328p"
//      cpu_clock       = "16000000L"
//      arduino_version = 10819
//      baudrate        = 115200
//      protocol        = "arduino"
//
//      [build]
//      platform_dir     = "/opt/firmforge/arduino-avr"
//      app_dir          = "build"
//      process_dir      = "."
//      sources          = ["src/blink.cpp", "src/util.c"]
//      archive          = ["src/util.c"]          # optional → libmain.a
//      include_dirs     = ["lib/Servo/src"]
//      cpp_options      = []
//      flags            = ["-DLED_PIN=13"]
//      ldflags          = []
//      libflags         = []
//      jobs             = 8
//      object_discovery = "directory-scan"        # or "explicit-list"
//
//      [flash]
//      port  = "/dev/ttyACM0"
//      baud  = 115200
//      stdio = "inherited"                        # or "captured"
//
//  Relative paths are taken relative to the manifest's directory.
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::command::{CompileOptions, DEFAULT_CONCURRENCY};
use crate::config::{BoardContext, BuildContext, ObjectDiscovery};
use crate::error::{BuildError, Result};
use crate::pipeline::BuildPlan;
use crate::process::StdioMode;
use crate::progress::ProgressSink;

pub const MANIFEST_FILE: &str = "firmforge.toml";
/// Overrides `build.platform_dir`.
pub const ENV_PLATFORM_DIR: &str = "FIRMFORGE_PLATFORM_DIR";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub board: BoardSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub flash: FlashSection,
}

/// `name` plus the board values handed to the build as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardSection {
    pub name: String,
    #[serde(flatten)]
    pub context: BoardContext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub platform_dir:     Option<PathBuf>,
    pub app_dir:          PathBuf,
    pub process_dir:      PathBuf,
    pub sources:          Vec<PathBuf>,
    pub archive:          Option<Vec<PathBuf>>,
    pub include_dirs:     Vec<PathBuf>,
    pub cpp_options:      Vec<String>,
    pub flags:            Vec<String>,
    pub ldflags:          Vec<String>,
    pub libflags:         Vec<String>,
    pub jobs:             usize,
    pub object_discovery: ObjectDiscovery,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            platform_dir:     None,
            app_dir:          PathBuf::from("build"),
            process_dir:      PathBuf::from("."),
            sources:          Vec::new(),
            archive:          None,
            include_dirs:     Vec::new(),
            cpp_options:      Vec::new(),
            flags:            Vec::new(),
            ldflags:          Vec::new(),
            libflags:         Vec::new(),
            jobs:             DEFAULT_CONCURRENCY,
            object_discovery: ObjectDiscovery::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlashSection {
    pub port:  Option<String>,
    pub baud:  Option<u32>,
    pub stdio: Option<StdioMode>,
}

impl Manifest {
    /// Read and parse a manifest, anchoring relative paths at its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut manifest: Manifest = toml::from_str(text)
            .map_err(|e| BuildError::Config(format!("invalid manifest: {e}")))?;
        manifest.anchor(base);
        Ok(manifest)
    }

    fn anchor(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        let b = &mut self.build;
        if let Some(p) = b.platform_dir.as_mut() { join(p); }
        join(&mut b.app_dir);
        join(&mut b.process_dir);
        b.sources.iter_mut().for_each(join);
        b.include_dirs.iter_mut().for_each(join);
        if let Some(members) = b.archive.as_mut() {
            members.iter_mut().for_each(join);
        }
    }

    /// Platform dir: explicit override, else the manifest value.
    pub fn platform_dir(&self, override_dir: Option<PathBuf>) -> Result<PathBuf> {
        override_dir
            .or_else(|| self.build.platform_dir.clone())
            .ok_or_else(|| BuildError::Config(format!(
                "no platform directory: set build.platform_dir or {ENV_PLATFORM_DIR}"
            )))
    }

    pub fn context(&self, platform_dir: PathBuf, progress: ProgressSink) -> BuildContext {
        BuildContext {
            platform_dir,
            board_name:       Some(self.board.name.clone()),
            app_dir:          Some(self.build.app_dir.clone()),
            process_dir:      Some(self.build.process_dir.clone()),
            board:            self.board.context.clone(),
            object_discovery: self.build.object_discovery,
            progress:         Some(progress),
        }
    }

    pub fn plan(&self) -> BuildPlan {
        let b = &self.build;
        BuildPlan {
            sources: b.sources.clone(),
            compile: CompileOptions {
                cpp_options:  b.cpp_options.clone(),
                board_flags:  b.flags.clone(),
                include_dirs: b.include_dirs.clone(),
                concurrency:  b.jobs,
            },
            ldflags:  b.ldflags.clone(),
            libflags: b.libflags.clone(),
            archive:  b.archive.clone(),
        }
    }
}
