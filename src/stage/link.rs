// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage :: link  —  objects → <board>.elf
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::command::build_link_command;
use crate::config::{BuildConfig, ObjectDiscovery};
use crate::error::{BuildError, Result};
use crate::process::{ProcessRunner, StdioMode};
use crate::progress::Progress;
use super::{settle, CompiledObjects, LinkedImage};

pub fn run<R>(
    cfg: &BuildConfig,
    runner: &R,
    compiled: &CompiledObjects,
    extra_flags: &[String],
    extra_libs: &[String],
) -> Result<LinkedImage>
where
    R: ProcessRunner + ?Sized,
{
    let elf = cfg.elf_path.display().to_string();
    tracing::info!(elf = %elf, discovery = ?cfg.object_discovery, "linking");
    cfg.progress.emit(Progress::info(None, format!("linking... {elf}")));

    let objects = match cfg.object_discovery {
        ObjectDiscovery::DirectoryScan => scan_objects(&cfg.app_dir)?,
        ObjectDiscovery::ExplicitList  => compiled.objects.clone(),
    };

    let cmd = build_link_command(cfg, &objects, extra_flags, extra_libs);
    let outcome = runner.run(&cmd, &cfg.process_dir, StdioMode::Captured);

    settle(cfg, "link", outcome).map_err(|output| BuildError::LinkFailed { output })?;

    Ok(LinkedImage { path: cfg.elf_path.clone() })
}

/// Every `*.o` directly inside `dir`, sorted by name. A missing or
/// unreadable directory is an error, not an empty list.
pub fn scan_objects(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut objects = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry.map_err(|e| BuildError::Config(format!(
            "cannot scan {} for object files: {e}", dir.display()
        )))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|x| x.to_str()) == Some("o")
        {
            objects.push(entry.into_path());
        }
    }
    objects.sort();
    Ok(objects)
}
