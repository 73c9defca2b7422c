// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: command  —  argument lists for every toolchain invocation
//
//  All builders are pure: same inputs, same argv. Each argument is its own
//  argv element, so paths containing spaces reach the tool intact without
//  any shell quoting. `CommandLine::render` gives the quoted display form.
// ─────────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::source::{Language, SourceFile};

pub const DEFAULT_BAUD: u32 = 115_200;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args:    Vec<String>,
}

impl CommandLine {
    pub fn new(program: &Path) -> Self {
        Self { program: PathBuf::from(host_path(program)), args: Vec::new() }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.arg(host_path(path))
    }

    /// Single-line form for logs, quoting every argument that needs it.
    pub fn render(&self) -> String {
        let mut out = quote(&self.program.to_string_lossy());
        for a in &self.args {
            out.push(' ');
            out.push_str(&quote(a));
        }
        out
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_owned()
    }
}

/// Platform paths are written with `/`; Windows tools want `\`.
pub fn host_path(path: &Path) -> String {
    host_str(&path.to_string_lossy())
}

/// `host_path` for an argument that embeds a path, e.g. `-I<dir>`.
pub fn host_str(arg: &str) -> String {
    if cfg!(windows) { arg.replace('/', "\\") } else { arg.to_owned() }
}

// ── Compile ──────────────────────────────────────────────────────────────────

/// Per-build compile inputs supplied by the caller.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Extra options placed first on the command line (board cpu options).
    pub cpp_options:  Vec<String>,
    /// Extra flags appended after the platform flag templates.
    pub board_flags:  Vec<String>,
    /// Plugin / library include directories, each emitted as `-I<dir>`.
    pub include_dirs: Vec<PathBuf>,
    /// Maximum number of compiler processes running at once.
    pub concurrency:  usize,
}

pub const DEFAULT_CONCURRENCY: usize = 8;

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            cpp_options:  Vec::new(),
            board_flags:  Vec::new(),
            include_dirs: Vec::new(),
            concurrency:  DEFAULT_CONCURRENCY,
        }
    }
}

/// Defines derived from the board context. Empty when the board has no
/// architecture, so no half-formed `-DARDUINO_` flags are produced.
pub fn board_defines(cfg: &BuildConfig) -> Vec<String> {
    let board = &cfg.board;
    let Some(arch) = board.arch.as_deref().filter(|a| !a.is_empty()) else {
        return Vec::new();
    };

    let mut flags = Vec::new();
    if let Some(mcu) = &board.mcu {
        flags.push(format!("-mmcu={mcu}"));
    }
    if let Some(clock) = &board.cpu_clock {
        flags.push(format!("-DF_CPU={clock}"));
    }
    if let Some(version) = &board.arduino_version {
        flags.push(format!("-DARDUINO={version}"));
    }
    flags.push(format!("-DARDUINO_{arch}"));
    flags.push(format!("-DARDUINO_ARCH_{}", cfg.arch_family));
    flags
}

pub fn build_compile_command(
    src: &SourceFile,
    obj: &Path,
    cfg: &BuildConfig,
    opts: &CompileOptions,
) -> CommandLine {
    let (compiler, templates) = match src.language {
        Language::C   => (&cfg.tools.cc, &cfg.cflags),
        Language::Cpp => (&cfg.tools.cxx, &cfg.cppflags),
    };

    let mut cmd = CommandLine::new(compiler);
    cmd.args(cfg.cpp_options.iter().cloned())
        .args(opts.cpp_options.iter().cloned())
        .args(templates.iter().cloned())
        .args(opts.board_flags.iter().cloned());

    for dir in &opts.include_dirs {
        cmd.arg(format!("-I{}", host_path(dir)));
    }

    cmd.args(board_defines(cfg))
        .arg("-c").path_arg(&src.path)
        .arg("-o").path_arg(obj);
    cmd
}

// ── Link / archive / convert ─────────────────────────────────────────────────

pub fn build_link_command(
    cfg: &BuildConfig,
    objects: &[PathBuf],
    extra_flags: &[String],
    extra_libs: &[String],
) -> CommandLine {
    let mut cmd = CommandLine::new(&cfg.tools.cc);
    cmd.args(cfg.ldflags.iter().cloned())
        .args(extra_flags.iter().cloned())
        .args(board_defines(cfg))
        .arg("-o").path_arg(&cfg.elf_path);

    for obj in objects {
        cmd.path_arg(obj);
    }

    cmd.arg(format!("-L{}", host_path(&cfg.app_dir)))
        .args(cfg.ldlibflag.iter().cloned())
        .args(extra_libs.iter().cloned())
        .arg("-lm");
    cmd
}

pub fn build_archive_command(cfg: &BuildConfig, objects: &[PathBuf]) -> CommandLine {
    let mut cmd = CommandLine::new(&cfg.tools.ar);
    cmd.arg("cru").path_arg(&cfg.archive_path);
    for obj in objects {
        cmd.path_arg(obj);
    }
    cmd
}

/// Intel HEX image without the EEPROM section.
pub fn build_convert_command(cfg: &BuildConfig, elf: &Path) -> CommandLine {
    let mut cmd = CommandLine::new(&cfg.tools.objcopy);
    cmd.args(["-O", "ihex", "-R", ".eeprom"])
        .path_arg(elf)
        .path_arg(&cfg.hex_path);
    cmd
}

// ── Flash ────────────────────────────────────────────────────────────────────

/// Board context wins, then the caller's value, then 115200.
pub fn resolve_baud(cfg: &BuildConfig, requested: Option<u32>) -> u32 {
    let set = |b: &u32| *b > 0;
    cfg.board.baudrate.filter(set)
        .or(requested.filter(set))
        .unwrap_or(DEFAULT_BAUD)
}

pub fn build_flash_command(cfg: &BuildConfig, image: &Path, port: &str, baud: u32) -> CommandLine {
    let mcu = cfg.board.mcu.as_deref().unwrap_or(&cfg.default_mcu);
    let protocol = cfg.board.protocol.as_deref().unwrap_or(&cfg.default_protocol);

    let mut cmd = CommandLine::new(&cfg.tools.programmer);
    cmd.arg("-C").path_arg(&cfg.tools.programmer_config)
        .arg(format!("-p{mcu}"))
        .arg(format!("-c{protocol}"))
        .arg(format!("-P{port}"))
        .arg(format!("-b{baud}"))
        .arg("-D")
        .arg(format!("-Uflash:w:{}:i", host_path(image)));
    cmd
}
