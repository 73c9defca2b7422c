// ─────────────────────────────────────────────────────────────────────────────
//  firmforge :: config  —  platform descriptor + invocation context
//
//  A platform directory looks like:
//
//      <platform>/
//      ├── context.json          ← flag templates, toolchain dir (this format)
//      ├── main.cpp              ← entry-point template copied into the app dir
//      ├── sdk/cores/arduino/    ← core sources compiled into every build
//      ├── tools/etc/avrdude.conf
//      └── <toolchain_dir>/      ← avr-gcc, avr-g++, avr-ar, avr-objcopy, avrdude
//
//  context.json format:
//
//      {
//        "toolchain_dir": "tools/bin",
//        "cflags":    ["-Os", "-I{platform}/sdk/cores/arduino"],
//        "cppflags":  ["-Os", "-fno-exceptions", "-I{platform}/sdk/cores/arduino"],
//        "ldflags":   ["-Os", "-Wl,--gc-sections"],
//        "ldlibflag": ["-L{platform}/lib"],
//        "cpp_options": []
//      }
//
//  Every `{platform}` placeholder is replaced by the platform directory.
// ─────────────────────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use walkdir::WalkDir;

use crate::command::host_str;
use crate::error::{BuildError, Result};
use crate::progress::ProgressSink;

pub const DESCRIPTOR_FILE: &str = "context.json";
pub const ENTRY_TEMPLATE:  &str = "main.cpp";
pub const ARCHIVE_NAME:    &str = "libmain.a";

const PLATFORM_PLACEHOLDER: &str = "{platform}";

// ── Platform descriptor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformDescriptor {
    /// Toolchain binary directory, relative to the platform root.
    pub toolchain_dir: String,
    pub cflags:        Vec<String>,
    pub cppflags:      Vec<String>,
    pub ldflags:       Vec<String>,
    pub ldlibflag:     Vec<String>,
    #[serde(default)]
    pub cpp_options:   Vec<String>,
    /// Value of the `ARDUINO_ARCH_*` define.
    #[serde(default = "default_arch_family")]
    pub arch_family:   String,
    /// Programmer part number used when the board context has no MCU.
    #[serde(default = "default_mcu")]
    pub default_mcu:   String,
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
    /// Toolchain binary prefix, e.g. `avr` for `avr-gcc`.
    #[serde(default = "default_tool_prefix")]
    pub tool_prefix:   String,
    #[serde(default = "default_core_dir")]
    pub core_dir:      String,
    #[serde(default = "default_programmer_config")]
    pub programmer_config: String,
}

fn default_arch_family() -> String { "AVR".into() }
fn default_mcu() -> String { "atmega328p".into() }
fn default_protocol() -> String { "arduino".into() }
fn default_tool_prefix() -> String { "avr".into() }
fn default_core_dir() -> String { "sdk/cores/arduino".into() }
fn default_programmer_config() -> String { "tools/etc/avrdude.conf".into() }

impl PlatformDescriptor {
    /// Load `<platform>/context.json`.
    pub fn load(platform_dir: &Path) -> Result<Self> {
        let path = platform_dir.join(DESCRIPTOR_FILE);
        let data = std::fs::read_to_string(&path).map_err(|e| {
            BuildError::Config(format!("cannot read platform descriptor {}: {e}", path.display()))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            BuildError::Config(format!("malformed platform descriptor {}: {e}", path.display()))
        })
    }
}

// ── Board context ────────────────────────────────────────────────────────────

/// Per-board values supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardContext {
    /// Architecture id, e.g. `AVR_UNO`. Without it no board defines are emitted.
    #[serde(default)]
    pub arch:            Option<String>,
    #[serde(default)]
    pub mcu:             Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cpu_clock:       Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub arduino_version: Option<String>,
    #[serde(default)]
    pub baudrate:        Option<u32>,
    /// Programmer protocol passed to avrdude's `-c`.
    #[serde(default)]
    pub protocol:        Option<String>,
}

fn string_or_number<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(u64),
    }

    Ok(Option::<Raw>::deserialize(de)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}

/// How the link stage finds its object files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectDiscovery {
    /// Every `*.o` in the app directory. Only correct when the directory is
    /// used by one build at a time; stale objects are linked too.
    #[default]
    DirectoryScan,
    /// Exactly the objects produced by the compile stage.
    ExplicitList,
}

// ── Invocation context ───────────────────────────────────────────────────────

/// Per-invocation inputs. `board_name`, `app_dir` and `process_dir` are
/// required; they are optional here so a missing one is a `Config` error
/// rather than a type error at the host boundary.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub platform_dir:     PathBuf,
    pub board_name:       Option<String>,
    pub app_dir:          Option<PathBuf>,
    pub process_dir:      Option<PathBuf>,
    pub board:            BoardContext,
    pub object_discovery: ObjectDiscovery,
    pub progress:         Option<ProgressSink>,
}

// ── Resolved configuration ───────────────────────────────────────────────────

/// Full paths to the toolchain executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub cc:         PathBuf,
    pub cxx:        PathBuf,
    pub ar:         PathBuf,
    pub objcopy:    PathBuf,
    pub programmer: PathBuf,
    pub programmer_config: PathBuf,
}

/// Everything a build needs, resolved once and read by every stage.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub platform_dir:  PathBuf,
    pub toolchain_dir: PathBuf,

    pub cflags:      Vec<String>,
    pub cppflags:    Vec<String>,
    pub ldflags:     Vec<String>,
    pub ldlibflag:   Vec<String>,
    pub cpp_options: Vec<String>,

    pub arch_family:      String,
    pub default_mcu:      String,
    pub default_protocol: String,

    pub tools: ToolPaths,

    pub board_name:   String,
    pub board:        BoardContext,
    pub elf_path:     PathBuf,
    pub hex_path:     PathBuf,
    pub archive_path: PathBuf,

    /// Platform core sources, sorted by file name.
    pub core_sources:   Vec<PathBuf>,
    pub entry_template: PathBuf,

    pub object_discovery: ObjectDiscovery,
    pub process_dir: PathBuf,
    pub app_dir:     PathBuf,
    pub progress:    ProgressSink,
}

/// Merge the platform descriptor and the invocation context.
pub fn resolve(ctx: BuildContext) -> Result<BuildConfig> {
    let board_name  = ctx.board_name.ok_or_else(|| missing("board_name"))?;
    let app_dir     = ctx.app_dir.ok_or_else(|| missing("app_dir"))?;
    let process_dir = ctx.process_dir.ok_or_else(|| missing("process_dir"))?;

    if board_name.trim().is_empty() {
        return Err(missing("board_name"));
    }

    let platform = ctx.platform_dir;
    let desc = PlatformDescriptor::load(&platform)?;

    let toolchain_dir = platform.join(&desc.toolchain_dir);
    let tool = |name: &str| {
        toolchain_dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
    };
    let tools = ToolPaths {
        cc:         tool(&format!("{}-gcc", desc.tool_prefix)),
        cxx:        tool(&format!("{}-g++", desc.tool_prefix)),
        ar:         tool(&format!("{}-ar", desc.tool_prefix)),
        objcopy:    tool(&format!("{}-objcopy", desc.tool_prefix)),
        programmer: tool("avrdude"),
        programmer_config: platform.join(&desc.programmer_config),
    };

    let core_sources = list_core_sources(&platform.join(&desc.core_dir))?;

    let config = BuildConfig {
        cflags:      substitute(&desc.cflags, &platform),
        cppflags:    substitute(&desc.cppflags, &platform),
        ldflags:     substitute(&desc.ldflags, &platform),
        ldlibflag:   substitute(&desc.ldlibflag, &platform),
        cpp_options: substitute(&desc.cpp_options, &platform),

        arch_family:      desc.arch_family,
        default_mcu:      desc.default_mcu,
        default_protocol: desc.default_protocol,

        tools,

        elf_path:     app_dir.join(format!("{board_name}.elf")),
        hex_path:     app_dir.join(format!("{board_name}.hex")),
        archive_path: app_dir.join(ARCHIVE_NAME),
        board_name,
        board: ctx.board,

        core_sources,
        entry_template: platform.join(ENTRY_TEMPLATE),

        object_discovery: ctx.object_discovery,
        process_dir,
        app_dir,
        progress: ctx.progress.unwrap_or_default(),

        toolchain_dir,
        platform_dir: platform,
    };

    tracing::debug!(
        board = %config.board_name,
        core_sources = config.core_sources.len(),
        app_dir = %config.app_dir.display(),
        "resolved build configuration"
    );

    Ok(config)
}

fn missing(field: &str) -> BuildError {
    BuildError::Config(format!("required context field `{field}` is missing"))
}

/// Expand `{platform}`. Templates that name a platform path get host
/// separators; every other flag is passed through untouched.
fn substitute(flags: &[String], platform: &Path) -> Vec<String> {
    let root = platform.to_string_lossy();
    flags.iter()
        .map(|f| {
            if f.contains(PLATFORM_PLACEHOLDER) {
                host_str(&f.replace(PLATFORM_PLACEHOLDER, &root))
            } else {
                f.clone()
            }
        })
        .collect()
}

fn list_core_sources(core_dir: &Path) -> Result<Vec<PathBuf>> {
    if !core_dir.is_dir() {
        return Err(BuildError::Config(format!(
            "core source directory {} does not exist", core_dir.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(core_dir).max_depth(1) {
        let entry = entry.map_err(|e| BuildError::Config(format!(
            "cannot list core sources in {}: {e}", core_dir.display()
        )))?;
        let ext = entry.path().extension().and_then(|x| x.to_str()).unwrap_or("");
        if entry.file_type().is_file() && matches!(ext, "c" | "cpp") {
            sources.push(entry.into_path());
        }
    }
    sources.sort();
    Ok(sources)
}
