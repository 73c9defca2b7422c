// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: stage :: compile
//
//  1. Append the entry point (main.cpp) and the platform core sources to
//     the caller's list; reject two sources that share an object path
//  2. Copy the platform entry point into the app dir
//  3. Compile everything in PARALLEL on a pool of `concurrency` threads,
//     each thread blocking on one compiler process at a time
//  4. Wait for every file, then fail with the first failure observed
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::command::{build_compile_command, CommandLine, CompileOptions};
use crate::config::{BuildConfig, ENTRY_TEMPLATE};
use crate::error::{BuildError, Result};
use crate::process::{ProcessRunner, RunOutcome, StdioMode};
use crate::progress::Progress;
use crate::source::SourceFile;
use super::CompiledObjects;

/// One source file bound to its command and object path.
#[derive(Debug, Clone)]
pub struct CompileTask {
    pub source:  SourceFile,
    pub object:  PathBuf,
    pub command: CommandLine,
}

impl CompileTask {
    pub fn new(source: SourceFile, cfg: &BuildConfig, opts: &CompileOptions) -> Self {
        let object = source.object_path(&cfg.app_dir);
        let command = build_compile_command(&source, &object, cfg, opts);
        Self { source, object, command }
    }
}

/// A settled task. `seq` is the order in which outcomes were observed.
struct Settled<'a> {
    task:    &'a CompileTask,
    outcome: RunOutcome,
    seq:     usize,
}

/// Caller sources + entry point + core sources, in that order. Touches
/// nothing on disk; two sources mapping to the same object file are a
/// `Config` error.
pub fn tasks(cfg: &BuildConfig, sources: &[PathBuf], opts: &CompileOptions) -> Result<Vec<CompileTask>> {
    let entry = cfg.app_dir.join(ENTRY_TEMPLATE);
    let tasks: Vec<CompileTask> = sources.iter().cloned()
        .chain(std::iter::once(entry))
        .chain(cfg.core_sources.iter().cloned())
        .map(|p| CompileTask::new(SourceFile::new(p), cfg, opts))
        .collect();

    let mut owners: HashMap<&Path, &Path> = HashMap::with_capacity(tasks.len());
    for task in &tasks {
        if let Some(first) = owners.insert(&task.object, &task.source.path) {
            return Err(BuildError::Config(format!(
                "{} and {} both compile to {}; rename one of them",
                first.display(), task.source.path.display(), task.object.display()
            )));
        }
    }
    Ok(tasks)
}

/// `tasks`, plus the app dir and the entry point copied into it.
pub fn plan(cfg: &BuildConfig, sources: &[PathBuf], opts: &CompileOptions) -> Result<Vec<CompileTask>> {
    let tasks = tasks(cfg, sources, opts)?;

    std::fs::create_dir_all(&cfg.app_dir)?;
    let entry = cfg.app_dir.join(ENTRY_TEMPLATE);
    std::fs::copy(&cfg.entry_template, &entry).map_err(|e| BuildError::Config(format!(
        "cannot copy entry point {} → {}: {e}",
        cfg.entry_template.display(), entry.display()
    )))?;

    Ok(tasks)
}

pub fn run<R>(
    cfg: &BuildConfig,
    runner: &R,
    sources: &[PathBuf],
    opts: &CompileOptions,
) -> Result<CompiledObjects>
where
    R: ProcessRunner + ?Sized,
{
    let tasks = plan(cfg, sources, opts)?;
    let jobs = opts.concurrency.max(1);

    tracing::info!(files = tasks.len(), jobs, "compiling");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("firmforge-cc-{i}"))
        .build()
        .map_err(std::io::Error::other)?;

    let observed = AtomicUsize::new(0);
    let settled: Vec<Settled<'_>> = pool.install(|| {
        tasks.par_iter().map(|task| {
            let outcome = runner.run(&task.command, &cfg.process_dir, StdioMode::Captured);
            let seq = observed.fetch_add(1, Ordering::SeqCst);
            report(cfg, task, &outcome);
            Settled { task, outcome, seq }
        }).collect()
    });

    let warnings = settled.iter()
        .filter(|s| matches!(s.outcome, RunOutcome::Warning { .. }))
        .count();

    let failed: Vec<&Settled<'_>> = settled.iter().filter(|s| s.outcome.is_failure()).collect();
    if let Some(first) = failed.iter().min_by_key(|s| s.seq) {
        return Err(BuildError::CompileFailed {
            file:   first.task.source.path.display().to_string(),
            output: first.outcome.diagnostics().to_owned(),
            failed: failed.len(),
        });
    }

    Ok(CompiledObjects {
        objects: tasks.into_iter().map(|t| t.object).collect(),
        warnings,
    })
}

fn report(cfg: &BuildConfig, task: &CompileTask, outcome: &RunOutcome) {
    let name = task.source.display_name();
    let event = match outcome {
        RunOutcome::Success => {
            tracing::debug!(file = %name, "compiled");
            Progress::info(Some(&name), format!("compiling... {name} ok."))
        }
        RunOutcome::Warning { diagnostics } => {
            tracing::warn!(file = %name, "compiled with warnings");
            Progress::warning(Some(&name), diagnostics.clone())
        }
        RunOutcome::Failure { diagnostics, .. } => {
            tracing::error!(file = %task.source.path.display(), "compile failed");
            Progress::error(Some(&name), diagnostics.clone())
        }
    };
    cfg.progress.emit(event);
}
