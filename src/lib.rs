// ─────────────────────────────────────────────────────────────────────────────
//  firmforge  —  public library API
// ─────────────────────────────────────────────────────────────────────────────

//! Firmware build pipeline: compile every translation unit with bounded
//! parallelism, link, archive, convert to Intel HEX and flash with avrdude.
//!
//! ```no_run
//! use firmforge::{BuildContext, BuildPlan, Pipeline, StdioMode};
//! use std::path::PathBuf;
//!
//! let pipeline = Pipeline::new(BuildContext {
//!     platform_dir: PathBuf::from("/opt/platforms/arduino-avr"),
//!     board_name:   Some("uno".into()),
//!     app_dir:      Some(PathBuf::from("build")),
//!     process_dir:  Some(PathBuf::from(".")),
//!     ..Default::default()
//! })?;
//!
//! let out = pipeline.build(&BuildPlan {
//!     sources: vec![PathBuf::from("src/blink.cpp")],
//!     ..Default::default()
//! })?;
//! pipeline.flash(&out.hex, "/dev/ttyACM0", None, StdioMode::Inherited)?;
//! # Ok::<(), firmforge::BuildError>(())
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod source;
pub mod stage;

pub use command::{CommandLine, CompileOptions};
pub use config::{BoardContext, BuildConfig, BuildContext, ObjectDiscovery};
pub use error::{BuildError, Result};
pub use pipeline::{BuildArtifacts, BuildPlan, Pipeline};
pub use process::{ProcessRunner, RunOutcome, StdioMode, SystemRunner};
pub use progress::{Progress, ProgressKind, ProgressSink};
pub use source::SourceFile;
pub use stage::{BinaryImage, CompiledObjects, LinkedImage, StaticLibrary};
