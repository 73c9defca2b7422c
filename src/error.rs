// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: error
// ─────────────────────────────────────────────────────────────────────────────

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compilation of {file} failed ({failed} file(s) failed in total):\n{output}")]
    CompileFailed { file: String, output: String, failed: usize },

    #[error("Link failed:\n{output}")]
    LinkFailed { output: String },

    #[error("Archive failed:\n{output}")]
    ArchiveFailed { output: String },

    #[error("Image conversion failed:\n{output}")]
    ConvertFailed { output: String },

    #[error("Flash failed on {port}:\n{output}")]
    FlashFailed { port: String, output: String },

    #[error("No firmware image found at {0}\n  Hint: run `firmforge build` first")]
    NoFirmware(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            BuildError::Config(_)              => "config",
            BuildError::CompileFailed { .. }   => "compile",
            BuildError::LinkFailed { .. }      => "link",
            BuildError::ArchiveFailed { .. }   => "archive",
            BuildError::ConvertFailed { .. }   => "convert",
            BuildError::FlashFailed { .. }    => "flash",
            BuildError::NoFirmware(_)          => "artifact",
            BuildError::Io(_)                  => "io",
        }
    }

    /// Captured tool output, if this error carries any.
    pub fn output(&self) -> Option<&str> {
        match self {
            BuildError::CompileFailed { output, .. }
            | BuildError::LinkFailed { output }
            | BuildError::ArchiveFailed { output }
            | BuildError::ConvertFailed { output }
            | BuildError::FlashFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
