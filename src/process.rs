// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: process  —  one external tool invocation
//
//  Every run waits for the child to exit before returning, so no process is
//  ever left un-reaped. Spawn errors and non-zero exits are folded into a
//  `RunOutcome` instead of bubbling up as raw I/O errors.
// ─────────────────────────────────────────────────────────────────────────────

use std::path::Path;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::command::CommandLine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    /// stdout/stderr captured and classified.
    #[default]
    Captured,
    /// Child shares the terminal; used for interactive programmers.
    Inherited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Exit 0 but the tool printed diagnostics.
    Warning { diagnostics: String },
    /// Non-zero exit, killed by a signal, or never started (`code` is `None`).
    Failure { code: Option<i32>, diagnostics: String },
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failure { .. })
    }

    pub fn diagnostics(&self) -> &str {
        match self {
            RunOutcome::Success => "",
            RunOutcome::Warning { diagnostics }
            | RunOutcome::Failure { diagnostics, .. } => diagnostics,
        }
    }
}

/// Seam between the stages and the OS.
pub trait ProcessRunner: Sync {
    fn run(&self, cmd: &CommandLine, cwd: &Path, mode: StdioMode) -> RunOutcome;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine, cwd: &Path, mode: StdioMode) -> RunOutcome {
        tracing::debug!(cwd = %cwd.display(), "exec {}", cmd.render());

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args).current_dir(cwd);

        match mode {
            StdioMode::Captured => {
                command.stdin(Stdio::null());
                match command.output() {
                    Ok(out) => classify(
                        out.status.success(),
                        out.status.code(),
                        &String::from_utf8_lossy(&out.stdout),
                        &String::from_utf8_lossy(&out.stderr),
                    ),
                    Err(e) => spawn_failure(cmd, e),
                }
            }
            StdioMode::Inherited => {
                command.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
                match command.status() {
                    Ok(status) => classify(status.success(), status.code(), "", ""),
                    Err(e) => spawn_failure(cmd, e),
                }
            }
        }
    }
}

fn classify(success: bool, code: Option<i32>, stdout: &str, stderr: &str) -> RunOutcome {
    let stderr = stderr.trim_end();
    if success {
        if stderr.is_empty() {
            RunOutcome::Success
        } else {
            RunOutcome::Warning { diagnostics: stderr.to_owned() }
        }
    } else {
        let stdout = stdout.trim_end();
        let diagnostics = match (stderr.is_empty(), stdout.is_empty()) {
            (false, false) => format!("{stderr}\n{stdout}"),
            (false, true)  => stderr.to_owned(),
            (true, false)  => stdout.to_owned(),
            (true, true)   => match code {
                Some(c) => format!("exited with status {c}"),
                None    => "terminated by signal".to_owned(),
            },
        };
        RunOutcome::Failure { code, diagnostics }
    }
}

fn spawn_failure(cmd: &CommandLine, e: std::io::Error) -> RunOutcome {
    RunOutcome::Failure {
        code: None,
        diagnostics: format!("failed to start {}: {e}", cmd.program.display()),
    }
}
