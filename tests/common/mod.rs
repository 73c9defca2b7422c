#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use firmforge::config::{resolve, BuildConfig, BuildContext, ObjectDiscovery};
use firmforge::{BoardContext, Progress, ProgressSink};
use tempfile::TempDir;

pub const DESCRIPTOR: &str = r#"{
    "toolchain_dir": "tools/bin",
    "cflags":    ["-Os", "-std=gnu11"],
    "cppflags":  ["-Os", "-std=gnu++11", "-fno-exceptions"],
    "ldflags":   ["-Os", "-Wl,--gc-sections"],
    "ldlibflag": ["-L{platform}/lib"]
}"#;

/// A platform directory with two core sources and a separate app dir.
pub struct Fixture {
    pub platform: TempDir,
    pub work:     TempDir,
    pub events:   Arc<Mutex<Vec<Progress>>>,
}

impl Fixture {
    pub fn new() -> Self {
        let platform = tempfile::tempdir().unwrap();
        std::fs::write(platform.path().join("context.json"), DESCRIPTOR).unwrap();
        std::fs::write(platform.path().join("main.cpp"), "int main() { setup(); }\n").unwrap();

        let core = platform.path().join("sdk/cores/arduino");
        std::fs::create_dir_all(&core).unwrap();
        std::fs::write(core.join("wiring.c"), "").unwrap();
        std::fs::write(core.join("Print.cpp"), "").unwrap();

        std::fs::create_dir_all(platform.path().join("tools/bin")).unwrap();
        std::fs::create_dir_all(platform.path().join("tools/etc")).unwrap();
        std::fs::write(platform.path().join("tools/etc/avrdude.conf"), "").unwrap();

        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(work.path().join("src")).unwrap();

        Self { platform, work, events: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn app_dir(&self) -> PathBuf {
        self.work.path().join("build")
    }

    /// Create an (empty) source file under `<work>/src`.
    pub fn source(&self, name: &str) -> PathBuf {
        let p = self.work.path().join("src").join(name);
        std::fs::write(&p, "").unwrap();
        p
    }

    pub fn context(&self, board: BoardContext, discovery: ObjectDiscovery) -> BuildContext {
        let events = Arc::clone(&self.events);
        BuildContext {
            platform_dir:     self.platform.path().to_owned(),
            board_name:       Some("uno".into()),
            app_dir:          Some(self.app_dir()),
            process_dir:      Some(self.work.path().to_owned()),
            board,
            object_discovery: discovery,
            progress:         Some(ProgressSink::new(move |p| events.lock().unwrap().push(p.clone()))),
        }
    }

    pub fn config(&self, discovery: ObjectDiscovery) -> BuildConfig {
        resolve(self.context(uno(), discovery)).unwrap()
    }

    pub fn events(&self) -> Vec<Progress> {
        self.events.lock().unwrap().clone()
    }
}

pub fn uno() -> BoardContext {
    BoardContext {
        arch:            Some("AVR_UNO".into()),
        mcu:             Some("atmega328p".into()),
        cpu_clock:       Some("16000000L".into()),
        arduino_version: Some("10819".into()),
        baudrate:        None,
        protocol:        None,
    }
}

/// Value following `flag` in an argument list.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

pub fn file_name(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().to_string()
}
