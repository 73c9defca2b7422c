//! End-to-end runs against a fake toolchain made of shell scripts.
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;

use common::{uno, Fixture};
use firmforge::config::{resolve, ObjectDiscovery};
use firmforge::manifest::{ENV_PLATFORM_DIR, MANIFEST_FILE};
use firmforge::{BuildError, BuildPlan, CompileOptions, Pipeline, ProgressKind, StdioMode};
use pretty_assertions::assert_eq;

/// Writing an executable while another thread forks can make exec fail with
/// ETXTBSY, so these tests never overlap.
static SERIAL: Mutex<()> = Mutex::new(());

/// Compiler / linker: touches the `-o` target. Sources named `broken*` fail,
/// `noisy*` succeed with a warning on stderr.
const GCC: &str = r#"#!/bin/sh
out=""; src=""; prev=""
for a in "$@"; do
  [ "$prev" = "-o" ] && out="$a"
  [ "$prev" = "-c" ] && src="$a"
  prev="$a"
done
case "$src" in
  *broken*) echo "$src:3:5: error: expected ';' before '}' token" >&2; exit 1 ;;
  *noisy*)  echo "$src:1:1: warning: unused variable 'x'" >&2 ;;
esac
[ -n "$out" ] && : > "$out"
exit 0
"#;

/// Archiver: `cru <archive> <objs...>`, records its members next to the archive.
const AR: &str = r#"#!/bin/sh
archive="$2"; shift 2
: > "$archive"
for o in "$@"; do echo "$o" >> "$archive.members"; done
"#;

/// objcopy: last argument is the output.
const OBJCOPY: &str = r#"#!/bin/sh
for a in "$@"; do last="$a"; done
echo ":00000001FF" > "$last"
"#;

/// avrdude: fails for ports containing "missing", otherwise logs its args.
const AVRDUDE: &str = r#"#!/bin/sh
for a in "$@"; do
  case "$a" in
    -P*missing*) echo "avrdude: ser_open(): can't open device \"${a#-P}\": No such file or directory" >&2; exit 1 ;;
  esac
done
echo "$@" > flash.log
"#;

fn install_toolchain(fx: &Fixture) {
    let bin = fx.platform.path().join("tools/bin");
    for (name, script) in [
        ("avr-gcc", GCC),
        ("avr-g++", GCC),
        ("avr-ar", AR),
        ("avr-objcopy", OBJCOPY),
        ("avrdude", AVRDUDE),
    ] {
        let path = bin.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

fn setup(discovery: ObjectDiscovery) -> (Fixture, Pipeline) {
    let fx = Fixture::new();
    install_toolchain(&fx);
    let cfg = resolve(fx.context(uno(), discovery)).unwrap();
    (fx, Pipeline::with_runner(cfg, firmforge::SystemRunner))
}

fn exists(dir: &Path, names: &[&str]) {
    for n in names {
        assert!(dir.join(n).is_file(), "{n} missing in {}", dir.display());
    }
}

#[test]
fn two_sources_build_to_a_hex_image() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (fx, p) = setup(ObjectDiscovery::DirectoryScan);
    let sources = vec![fx.source("foo.c"), fx.source("bar.cpp")];

    let out = p.build(&BuildPlan {
        sources: sources.clone(),
        compile: CompileOptions { concurrency: 2, ..Default::default() },
        archive: Some(sources),
        ..Default::default()
    }).unwrap();

    let app = fx.app_dir();
    exists(&app, &["foo.o", "bar.o", "main.o", "main.cpp", "uno.elf", "uno.hex", "libmain.a"]);
    assert_eq!(out.elf.path, app.join("uno.elf"));
    assert_eq!(std::fs::read_to_string(&out.hex.path).unwrap().trim(), ":00000001FF");

    let members = std::fs::read_to_string(app.join("libmain.a.members")).unwrap();
    let members: Vec<&str> = members.lines().collect();
    assert_eq!(members, vec![
        app.join("foo.o").to_str().unwrap(),
        app.join("bar.o").to_str().unwrap(),
    ]);

    let compiled = fx.events().iter()
        .filter(|e| e.kind == ProgressKind::Info && e.message.starts_with("compiling..."))
        .count();
    assert!(compiled >= 3, "only {compiled} compile events");
}

#[test]
fn paths_with_spaces_survive() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (fx, p) = setup(ObjectDiscovery::ExplicitList);
    let dir = fx.work.path().join("my sketch");
    std::fs::create_dir_all(&dir).unwrap();
    let src = dir.join("blink led.cpp");
    std::fs::write(&src, "").unwrap();

    p.compile(&[src], &CompileOptions::default()).unwrap();

    exists(&fx.app_dir(), &["blink led.o"]);
}

#[test]
fn failing_file_is_named_and_siblings_still_compile() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (fx, p) = setup(ObjectDiscovery::DirectoryScan);
    let sources = vec![fx.source("ok.c"), fx.source("broken.cpp"), fx.source("noisy.c")];

    let err = p.compile(&sources, &CompileOptions { concurrency: 2, ..Default::default() }).unwrap_err();

    match err {
        BuildError::CompileFailed { file, output, failed } => {
            assert!(file.ends_with("broken.cpp"));
            assert!(output.contains("error: expected ';'"));
            assert_eq!(failed, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }

    exists(&fx.app_dir(), &["ok.o", "noisy.o", "main.o", "wiring.o", "Print.o"]);

    let events = fx.events();
    assert_eq!(events.len(), 6);
    assert!(events.iter().any(|e| e.kind == ProgressKind::Warning && e.file.as_deref() == Some("noisy.c")));
    assert!(events.iter().any(|e| e.kind == ProgressKind::Error && e.file.as_deref() == Some("broken.cpp")));
}

#[test]
fn flash_runs_programmer_in_the_working_directory() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (fx, p) = setup(ObjectDiscovery::DirectoryScan);
    std::fs::create_dir_all(fx.app_dir()).unwrap();
    std::fs::write(fx.app_dir().join("uno.hex"), ":00000001FF\n").unwrap();

    let image = p.existing_image().unwrap();
    p.flash(&image, "/dev/ttyACM0", Some(57600), StdioMode::Captured).unwrap();

    let log = std::fs::read_to_string(fx.work.path().join("flash.log")).unwrap();
    assert!(log.contains("-patmega328p"));
    assert!(log.contains("-carduino"));
    assert!(log.contains("-P/dev/ttyACM0"));
    assert!(log.contains("-b57600"));
    assert!(log.contains(&format!("-Uflash:w:{}:i", image.path.display())));
}

#[test]
fn flash_failure_keeps_the_programmer_message() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (fx, p) = setup(ObjectDiscovery::DirectoryScan);
    let image = firmforge::BinaryImage { path: fx.app_dir().join("uno.hex") };

    let err = p.flash(&image, "/dev/missing0", None, StdioMode::Captured).unwrap_err();

    assert!(err.to_string().contains("can't open device"));
    assert_eq!(err.stage(), "flash");
}

#[test]
fn missing_toolchain_fails_without_panicking() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    let p = Pipeline::new(fx.context(uno(), ObjectDiscovery::DirectoryScan)).unwrap();

    let err = p.compile(&[fx.source("a.c")], &CompileOptions::default()).unwrap_err();

    match err {
        BuildError::CompileFailed { output, failed, .. } => {
            assert!(output.contains("failed to start"));
            assert_eq!(failed, 4);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  CLI
// ─────────────────────────────────────────────────────────────────────────────

fn write_manifest(fx: &Fixture) -> PathBuf {
    fx.source("foo.c");
    let path = fx.work.path().join(MANIFEST_FILE);
    let text = format!(
        r#"
[board]
name = "uno"
arch = "AVR_UNO"
mcu = "atmega328p"
cpu_clock = 16000000

[build]
platform_dir = "{}"
sources = ["src/foo.c"]
archive = ["src/foo.c"]
jobs = 2

[flash]
port = "/dev/ttyACM0"
"#,
        fx.platform.path().display()
    );
    std::fs::write(&path, text).unwrap();
    path
}

fn firmforge(manifest: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_firmforge"))
        .arg("--manifest").arg(manifest)
        .args(["--quiet", "--no-color"])
        .args(args)
        .env_remove(ENV_PLATFORM_DIR)
        .env_remove("FIRMFORGE_LOG")
        .output()
        .unwrap()
}

fn succeeded(out: &Output) {
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn each_stage_runs_on_its_own_from_the_cli() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    install_toolchain(&fx);
    let manifest = write_manifest(&fx);
    let app = fx.app_dir();

    succeeded(&firmforge(&manifest, &["compile"]));
    exists(&app, &["foo.o", "main.o", "wiring.o", "Print.o"]);
    assert!(!app.join("uno.elf").exists());

    succeeded(&firmforge(&manifest, &["link"]));
    exists(&app, &["uno.elf"]);

    succeeded(&firmforge(&manifest, &["archive"]));
    let members = std::fs::read_to_string(app.join("libmain.a.members")).unwrap();
    assert_eq!(members.trim(), app.join("foo.o").to_str().unwrap());

    assert!(!app.join("uno.hex").exists());
    succeeded(&firmforge(&manifest, &["convert"]));
    exists(&app, &["uno.hex"]);
}

#[test]
fn convert_without_a_linked_image_exits_nonzero() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    install_toolchain(&fx);
    let manifest = write_manifest(&fx);

    let out = firmforge(&manifest, &["convert"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("uno.elf"));
}

#[test]
fn commands_prints_the_plan_and_writes_nothing() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new();
    install_toolchain(&fx);
    let manifest = write_manifest(&fx);

    let out = firmforge(&manifest, &["commands"]);
    succeeded(&out);

    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    // foo.c, main.cpp, two core files, link, archive, convert, flash
    assert_eq!(lines.len(), 8, "{stdout}");
    assert!(lines[0].contains("foo.c"));
    assert!(lines[4].contains("uno.elf"));
    assert!(lines[5].contains("libmain.a"));
    assert!(lines[6].contains("-O ihex"));
    assert!(lines[7].contains("-P/dev/ttyACM0"));
    assert!(!fx.app_dir().exists());
}
