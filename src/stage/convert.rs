// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage :: convert  —  <board>.elf → <board>.hex
// ─────────────────────────────────────────────────────────────────────────────

use crate::command::build_convert_command;
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::process::{ProcessRunner, StdioMode};
use crate::progress::Progress;
use super::{settle, BinaryImage, LinkedImage};

pub fn run<R>(cfg: &BuildConfig, runner: &R, elf: &LinkedImage) -> Result<BinaryImage>
where
    R: ProcessRunner + ?Sized,
{
    let hex = cfg.hex_path.display().to_string();
    tracing::info!(hex = %hex, "creating hex image");
    cfg.progress.emit(Progress::info(None, format!("creating hex image... {hex}")));

    let cmd = build_convert_command(cfg, &elf.path);
    let outcome = runner.run(&cmd, &cfg.process_dir, StdioMode::Captured);

    settle(cfg, "convert", outcome).map_err(|output| BuildError::ConvertFailed { output })?;

    Ok(BinaryImage { path: cfg.hex_path.clone() })
}
