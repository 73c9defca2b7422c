// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage :: archive  —  selected objects → libmain.a
// ─────────────────────────────────────────────────────────────────────────────

use std::path::PathBuf;

use crate::command::build_archive_command;
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::process::{ProcessRunner, StdioMode};
use crate::progress::Progress;
use crate::source::SourceFile;
use super::{settle, StaticLibrary};

/// Archive the objects of exactly the given sources, not whatever happens
/// to be in the app dir.
pub fn run<R>(cfg: &BuildConfig, runner: &R, sources: &[PathBuf]) -> Result<StaticLibrary>
where
    R: ProcessRunner + ?Sized,
{
    let archive = cfg.archive_path.display().to_string();
    tracing::info!(archive = %archive, members = sources.len(), "archiving");
    cfg.progress.emit(Progress::info(None, format!("archiving... {archive}")));

    let objects: Vec<PathBuf> = sources.iter()
        .map(|src| SourceFile::new(src.as_path()).object_path(&cfg.app_dir))
        .collect();

    let cmd = build_archive_command(cfg, &objects);
    let outcome = runner.run(&cmd, &cfg.process_dir, StdioMode::Captured);

    settle(cfg, "archive", outcome).map_err(|output| BuildError::ArchiveFailed { output })?;

    Ok(StaticLibrary { path: cfg.archive_path.clone() })
}
