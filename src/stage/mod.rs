// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage  —  compile → link → archive → convert → flash
//
//  Each stage consumes the artifact produced by the one before it, so the
//  ordering is carried by the types rather than by call order alone.
// ─────────────────────────────────────────────────────────────────────────────

pub mod archive;
pub mod compile;
pub mod convert;
pub mod flash;
pub mod link;

use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::process::RunOutcome;
use crate::progress::Progress;

/// Output of the compile stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledObjects {
    /// Object files in dispatch order.
    pub objects:  Vec<PathBuf>,
    /// Number of files that compiled with diagnostics.
    pub warnings: usize,
}

/// `<app>/<board>.elf`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedImage {
    pub path: PathBuf,
}

impl LinkedImage {
    /// A previously linked ELF, for converting without relinking.
    pub fn existing(cfg: &BuildConfig) -> Result<Self> {
        if cfg.elf_path.is_file() {
            Ok(Self { path: cfg.elf_path.clone() })
        } else {
            Err(BuildError::NoFirmware(cfg.elf_path.display().to_string()))
        }
    }
}

/// `<app>/libmain.a`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticLibrary {
    pub path: PathBuf,
}

/// `<app>/<board>.hex`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    pub path: PathBuf,
}

impl BinaryImage {
    /// A previously built image, for flashing without rebuilding.
    pub fn existing(cfg: &BuildConfig) -> Result<Self> {
        if cfg.hex_path.is_file() {
            Ok(Self { path: cfg.hex_path.clone() })
        } else {
            Err(BuildError::NoFirmware(cfg.hex_path.display().to_string()))
        }
    }
}

/// Report a single-invocation outcome. Warnings go to the progress sink
/// and the stage carries on; failures hand back the diagnostic text.
fn settle(cfg: &BuildConfig, stage: &str, outcome: RunOutcome) -> std::result::Result<(), String> {
    match outcome {
        RunOutcome::Success => Ok(()),
        RunOutcome::Warning { diagnostics } => {
            tracing::warn!(stage, "{diagnostics}");
            cfg.progress.emit(Progress::warning(None, diagnostics));
            Ok(())
        }
        RunOutcome::Failure { code, diagnostics } => {
            tracing::error!(stage, ?code, "{diagnostics}");
            cfg.progress.emit(Progress::error(None, diagnostics.clone()));
            Err(diagnostics)
        }
    }
}
