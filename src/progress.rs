// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: progress  —  per-file status events for the host
// ─────────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Info,
    Warning,
    Error,
}

/// One status update. `file` is the short file name the update is about,
/// `None` for stage-level messages such as "linking...".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub kind:    ProgressKind,
    pub file:    Option<String>,
    pub message: String,
}

impl Progress {
    pub fn info(file: Option<&str>, message: impl Into<String>) -> Self {
        Self { kind: ProgressKind::Info, file: file.map(str::to_owned), message: message.into() }
    }

    pub fn warning(file: Option<&str>, message: impl Into<String>) -> Self {
        Self { kind: ProgressKind::Warning, file: file.map(str::to_owned), message: message.into() }
    }

    pub fn error(file: Option<&str>, message: impl Into<String>) -> Self {
        Self { kind: ProgressKind::Error, file: file.map(str::to_owned), message: message.into() }
    }
}

type Callback = dyn Fn(&Progress) + Send + Sync;

/// Callback receiving [`Progress`] events. Called from compile worker
/// threads, hence `Send + Sync`.
#[derive(Clone)]
pub struct ProgressSink(Arc<Callback>);

impl ProgressSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: Progress) {
        (self.0)(&event)
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sink_forwards_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ProgressSink::new(move |p| seen.lock().unwrap().push(p.clone()))
        };

        sink.emit(Progress::info(Some("foo.c"), "compiling... foo.c ok."));
        sink.emit(Progress::warning(Some("bar.cpp"), "unused variable"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ProgressKind::Info);
        assert_eq!(seen[1].file.as_deref(), Some("bar.cpp"));
    }

    #[test]
    fn default_sink_is_silent() {
        ProgressSink::default().emit(Progress::error(None, "ignored"));
    }
}
