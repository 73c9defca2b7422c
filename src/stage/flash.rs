// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage :: flash  —  <board>.hex → device, via avrdude
// ─────────────────────────────────────────────────────────────────────────────

use crate::command::{build_flash_command, resolve_baud};
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::process::{ProcessRunner, StdioMode};
use crate::progress::Progress;
use super::{settle, BinaryImage};

/// Flash `image` to the board on `port`.
///
/// The baud rate comes from the board context if it has one, else `baud`,
/// else 115200. Use [`StdioMode::Inherited`] when the programmer may need to
/// talk to the operator; nothing is captured in that mode, so a failure only
/// carries the exit status.
pub fn run<R>(
    cfg: &BuildConfig,
    runner: &R,
    image: &BinaryImage,
    port: &str,
    baud: Option<u32>,
    mode: StdioMode,
) -> Result<()>
where
    R: ProcessRunner + ?Sized,
{
    if port.trim().is_empty() {
        return Err(BuildError::Config("a serial port is required for flashing".into()));
    }

    let baud = resolve_baud(cfg, baud);
    tracing::info!(port, baud, image = %image.path.display(), "flashing");
    cfg.progress.emit(Progress::info(None, format!("flashing... {port} @ {baud}")));

    let cmd = build_flash_command(cfg, &image.path, port, baud);
    let outcome = runner.run(&cmd, &cfg.process_dir, mode);

    settle(cfg, "flash", outcome)
        .map_err(|output| BuildError::FlashFailed { port: port.to_owned(), output })
}
