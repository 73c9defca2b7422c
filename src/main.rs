// ─────────────────────────────────────────────────────────────────────────────
//  firmforge  —  firmware compile, link, convert & flash
//
//  USAGE
//  ─────
//    firmforge build                          (reads ./firmforge.toml)
//    firmforge build    --manifest path/to/firmforge.toml --jobs 4
//    firmforge flash    --port /dev/ttyACM0   --baud 57600
//    firmforge run      --port /dev/ttyACM0
//    firmforge compile  -j 2                  (single stages: compile, link,
//    firmforge link                            archive, convert)
//    firmforge commands                       (print every tool invocation)
// ─────────────────────────────────────────────────────────────────────────────

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use firmforge::command::{
    build_archive_command, build_convert_command, build_flash_command, build_link_command,
    resolve_baud,
};
use firmforge::manifest::{Manifest, ENV_PLATFORM_DIR, MANIFEST_FILE};
use firmforge::stage::compile;
use firmforge::stage::link::scan_objects;
use firmforge::{
    BuildError, CompiledObjects, ObjectDiscovery, Pipeline, Progress, ProgressKind, ProgressSink,
    SourceFile, StdioMode,
};

// ─────────────────────────────────────────────────────────────────────────────
//  CLI definition (clap derive)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "firmforge",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Firmware build pipeline — compile, link, convert and flash",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Project manifest
    #[arg(long, short = 'm', global = true, default_value = MANIFEST_FILE)]
    manifest: PathBuf,

    /// Platform directory (overrides build.platform_dir and $FIRMFORGE_PLATFORM_DIR)
    #[arg(long, global = true)]
    platform: Option<PathBuf>,

    /// Suppress per-file progress output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log every tool invocation
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compile, link, archive (if configured) and convert to .hex
    Build(BuildArgs),
    /// Compile sources, entry point and core into the app dir
    Compile(BuildArgs),
    /// Link the app dir's objects into <board>.elf
    Link,
    /// Pack the objects of build.archive into libmain.a
    Archive,
    /// Convert a linked <board>.elf into <board>.hex
    Convert,
    /// Flash the previously built .hex to a connected board
    Flash(FlashArgs),
    /// Build then flash  (shortcut for build + flash)
    Run(RunArgs),
    /// Print every tool invocation a build would make; runs nothing and writes nothing
    Commands,
}

#[derive(Args)]
struct BuildArgs {
    /// Maximum parallel compiler processes (default: build.jobs, else 8)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,
}

#[derive(Args)]
struct FlashArgs {
    /// Serial port (default: flash.port)
    #[arg(long, short = 'p')]
    port: Option<String>,

    /// Baud rate, used only when the board does not define one
    #[arg(long)]
    baud: Option<u32>,

    /// Capture programmer output instead of sharing the terminal
    #[arg(long)]
    capture: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    build: BuildArgs,

    #[command(flatten)]
    flash: FlashArgs,
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Cmd::Build(args)   => cmd_build(&cli, args).map(|_| ()),
        Cmd::Compile(args) => cmd_compile(&cli, args),
        Cmd::Link          => cmd_link(&cli),
        Cmd::Archive       => cmd_archive(&cli),
        Cmd::Convert       => cmd_convert(&cli),
        Cmd::Flash(args)   => cmd_flash(&cli, args),
        Cmd::Run(args)     => cmd_run(&cli, args),
        Cmd::Commands      => cmd_commands(&cli),
    };

    if let Err(e) = result {
        match e.downcast_ref::<BuildError>() {
            Some(build_err) => render_error(build_err),
            None => eprintln!("{} {:#}", "✗".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "firmforge=debug" } else { "firmforge=warn" };
    let filter = EnvFilter::try_from_env("FIRMFORGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ─────────────────────────────────────────────────────────────────────────────
//  Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_build(cli: &Cli, args: &BuildArgs) -> anyhow::Result<(Manifest, Pipeline)> {
    let (manifest, pipeline) = open(cli)?;
    let mut plan = manifest.plan();
    if let Some(jobs) = args.jobs {
        plan.compile.concurrency = jobs;
    }

    let cfg = pipeline.config();
    if !cli.quiet {
        println!(
            "{} {} {} {}",
            "Building".cyan().bold(),
            format!("[board: {}]", cfg.board_name).dimmed(),
            format!("[{} sources + {} core]", plan.sources.len(), cfg.core_sources.len()).dimmed(),
            format!("[jobs: {}]", plan.compile.concurrency.max(1)).dimmed(),
        );
        println!("{}", "─".repeat(60).dimmed());
    }

    let t0 = Instant::now();
    let out = pipeline.build(&plan)?;

    if !cli.quiet {
        println!("{} built in {:.2}s", "✓".green().bold(), t0.elapsed().as_secs_f64());
        println!("  {} {}", "elf:".dimmed(), out.elf.path.display());
        println!("  {} {}", "hex:".dimmed(), out.hex.path.display());
        if let Some(lib) = &out.library {
            println!("  {} {}", "lib:".dimmed(), lib.path.display());
        }
        if out.objects.warnings > 0 {
            println!("  {} {} file(s) compiled with warnings", "!".yellow(), out.objects.warnings);
        }
    }

    Ok((manifest, pipeline))
}

fn cmd_compile(cli: &Cli, args: &BuildArgs) -> anyhow::Result<()> {
    let (manifest, pipeline) = open(cli)?;
    let mut plan = manifest.plan();
    if let Some(jobs) = args.jobs {
        plan.compile.concurrency = jobs;
    }

    let t0 = Instant::now();
    let out = pipeline.compile(&plan.sources, &plan.compile)?;

    if !cli.quiet {
        println!(
            "{} {} object(s) in {:.2}s",
            "✓".green().bold(),
            out.objects.len(),
            t0.elapsed().as_secs_f64(),
        );
        if out.warnings > 0 {
            println!("  {} {} file(s) compiled with warnings", "!".yellow(), out.warnings);
        }
    }
    Ok(())
}

fn cmd_link(cli: &Cli) -> anyhow::Result<()> {
    let (manifest, pipeline) = open(cli)?;
    let plan = manifest.plan();

    // What a compile of this manifest produces; only read in explicit-list mode.
    let objects = compile::tasks(pipeline.config(), &plan.sources, &plan.compile)?
        .into_iter()
        .map(|t| t.object)
        .collect();
    let compiled = CompiledObjects { objects, warnings: 0 };

    let elf = pipeline.link(&compiled, &plan.ldflags, &plan.libflags)?;
    if !cli.quiet {
        println!("{} {}", "✓".green().bold(), elf.path.display());
    }
    Ok(())
}

fn cmd_archive(cli: &Cli) -> anyhow::Result<()> {
    let (manifest, pipeline) = open(cli)?;
    let members = manifest.build.archive.as_deref()
        .context("nothing to archive: set build.archive in the manifest")?;

    let lib = pipeline.archive(members)?;
    if !cli.quiet {
        println!("{} {}", "✓".green().bold(), lib.path.display());
    }
    Ok(())
}

fn cmd_convert(cli: &Cli) -> anyhow::Result<()> {
    let (_, pipeline) = open(cli)?;
    let elf = pipeline.existing_elf()?;

    let hex = pipeline.convert(&elf)?;
    if !cli.quiet {
        println!("{} {}", "✓".green().bold(), hex.path.display());
    }
    Ok(())
}

fn cmd_flash(cli: &Cli, args: &FlashArgs) -> anyhow::Result<()> {
    let (manifest, pipeline) = open(cli)?;
    flash_with(cli, args, &manifest, &pipeline)
}

fn cmd_run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let (manifest, pipeline) = cmd_build(cli, &args.build)?;
    if !cli.quiet {
        println!();
    }
    flash_with(cli, &args.flash, &manifest, &pipeline)
}

fn flash_with(cli: &Cli, args: &FlashArgs, manifest: &Manifest, pipeline: &Pipeline) -> anyhow::Result<()> {
    let port = args.port.clone()
        .or_else(|| manifest.flash.port.clone())
        .context("no serial port: pass --port or set flash.port")?;
    let baud = args.baud.or(manifest.flash.baud);
    let mode = if args.capture {
        StdioMode::Captured
    } else {
        manifest.flash.stdio.unwrap_or(StdioMode::Inherited)
    };

    let image = pipeline.existing_image()?;
    if !cli.quiet {
        println!(
            "{} {} {}",
            "Flashing".cyan().bold(),
            format!("[port: {}]", port).dimmed(),
            format!("[baud: {}]", resolve_baud(pipeline.config(), baud)).dimmed(),
        );
        println!("{}", "─".repeat(60).dimmed());
    }

    pipeline.flash(&image, &port, baud, mode)?;

    if !cli.quiet {
        println!("{} firmware uploaded to {}", "✓".green().bold(), port.bold());
    }
    Ok(())
}

fn cmd_commands(cli: &Cli) -> anyhow::Result<()> {
    let (manifest, pipeline) = open(cli)?;
    let cfg = pipeline.config();
    let build = manifest.plan();

    let tasks = compile::tasks(cfg, &build.sources, &build.compile)?;
    for task in &tasks {
        println!("{}", task.command.render());
    }

    let mut objects: Vec<PathBuf> = tasks.iter().map(|t| t.object.clone()).collect();
    if cfg.object_discovery == ObjectDiscovery::DirectoryScan {
        // After compiling, the scan also sees whatever is already there.
        if cfg.app_dir.is_dir() {
            objects.extend(scan_objects(&cfg.app_dir)?);
        }
        objects.sort();
        objects.dedup();
    }
    println!("{}", build_link_command(cfg, &objects, &build.ldflags, &build.libflags).render());

    if let Some(members) = &build.archive {
        let objs: Vec<PathBuf> = members.iter()
            .map(|m| SourceFile::new(m.as_path()).object_path(&cfg.app_dir))
            .collect();
        println!("{}", build_archive_command(cfg, &objs).render());
    }

    println!("{}", build_convert_command(cfg, &cfg.elf_path).render());

    if let Some(port) = &manifest.flash.port {
        let baud = resolve_baud(cfg, manifest.flash.baud);
        println!("{}", build_flash_command(cfg, &cfg.hex_path, port, baud).render());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn open(cli: &Cli) -> anyhow::Result<(Manifest, Pipeline)> {
    let manifest = Manifest::load(&cli.manifest)
        .with_context(|| format!("loading {}", cli.manifest.display()))?;

    let override_dir = cli.platform.clone()
        .or_else(|| std::env::var_os(ENV_PLATFORM_DIR).map(PathBuf::from));
    let platform = manifest.platform_dir(override_dir)?;

    let ctx = manifest.context(platform, progress_printer(cli.quiet));
    let pipeline = Pipeline::new(ctx)?;
    Ok((manifest, pipeline))
}

fn progress_printer(quiet: bool) -> ProgressSink {
    ProgressSink::new(move |p: &Progress| match p.kind {
        ProgressKind::Info => {
            if !quiet {
                println!("  {} {}", "→".cyan(), p.message.dimmed());
            }
        }
        ProgressKind::Warning => {
            let file = p.file.as_deref().unwrap_or("");
            eprintln!("  {} {} {}", "!".yellow().bold(), file.yellow(), "(with warnings)".dimmed());
            if !quiet {
                print_diagnostics(&p.message);
            }
        }
        ProgressKind::Error => {
            let file = p.file.as_deref().unwrap_or("");
            eprintln!("  {} {}", "✗".red().bold(), file.red());
        }
    })
}

fn print_diagnostics(output: &str) {
    for line in output.lines() {
        if line.contains("error:") {
            eprintln!("    {}", line.red());
        } else if line.contains("warning:") {
            eprintln!("    {}", line.yellow());
        } else if !line.trim().is_empty() {
            eprintln!("    {}", line.dimmed());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Error rendering
// ─────────────────────────────────────────────────────────────────────────────

fn render_error(e: &BuildError) {
    let title = match e {
        BuildError::Config(_)            => "ConfigError",
        BuildError::CompileFailed { .. } => "CompileError",
        BuildError::LinkFailed { .. }    => "LinkError",
        BuildError::ArchiveFailed { .. } => "ArchiveError",
        BuildError::ConvertFailed { .. } => "ConvertError",
        BuildError::FlashFailed { .. }   => "FlashError",
        BuildError::NoFirmware(_)        => "MissingArtifact",
        BuildError::Io(_)                => "IoError",
    };
    eprintln!("\n{} {} stage failed", title.red().bold(), e.stage());
    eprintln!("{}", "─".repeat(60).dimmed());

    match e {
        BuildError::CompileFailed { file, output, failed } => {
            eprintln!("  {} {}", "file:".dimmed(), file.bold());
            if *failed > 1 {
                eprintln!("  {} {} other file(s) also failed", "!".yellow(), failed - 1);
            }
            print_diagnostics(output);
        }
        BuildError::FlashFailed { port, output } => {
            eprintln!("  {} {}", "port:".dimmed(), port.bold());
            print_diagnostics(output);
            eprintln!();
            eprintln!("  {}", "Hints:".bold());
            eprintln!("  • Ensure the board is connected and in bootloader mode");
            eprintln!("  • Check you have permission to open the port");
            eprintln!("  • Check board.mcu / board.protocol match the hardware");
        }
        other => match other.output() {
            Some(output) => print_diagnostics(output),
            None => eprintln!("  {}", other),
        },
    }

    eprintln!("{}", "─".repeat(60).dimmed());
}
