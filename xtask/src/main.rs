use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for emu-host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Integration test suites under tests/
#[derive(Clone, Copy, ValueEnum)]
enum Suite {
    Lifecycle,
    Validation,
    Input,
    Audio,
    Pacing,
}

impl Suite {
    fn target(self) -> &'static str {
        match self {
            Suite::Lifecycle => "host_lifecycle",
            Suite::Validation => "rom_validation",
            Suite::Input => "input_mask",
            Suite::Audio => "audio_timeline",
            Suite::Pacing => "pacing",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the project
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run unit tests only
        #[arg(long, conflicts_with = "suite")]
        lib: bool,
        /// Run a single integration suite
        #[arg(long, value_enum)]
        suite: Option<Suite>,
        /// Number of cases per property test
        #[arg(long)]
        cases: Option<u32>,
    },
    /// Run benchmarks
    Bench,
    /// Validate a ROM image without loading a core
    Validate {
        /// Path to the ROM file
        rom_path: String,
        /// Console the ROM targets (nes or chip8)
        #[arg(long, default_value = "nes")]
        console: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test { lib, suite, cases } => run_test(lib, suite, cases),
        Commands::Bench => execute_command(Command::new("cargo").arg("bench")),
        Commands::Validate { rom_path, console } => run_validate(&rom_path, &console),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task("Test", || run_test(false, None, None), verbose)?;

    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );

    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("fmt").arg("--all");

    if check {
        cmd.arg("--").arg("--check");
    }

    execute_command(&mut cmd)
}

/// CI runners have no audio stack, so they build without cpal
fn feature_args(cmd: &mut Command) {
    if std::env::var("CI").is_ok() {
        cmd.arg("--no-default-features");
    } else {
        cmd.arg("--all-features");
    }
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy").arg("--all-targets");
    feature_args(&mut cmd);

    if fix {
        cmd.arg("--fix");
    } else {
        cmd.arg("--").arg("-D").arg("warnings");
    }

    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("build");
    feature_args(&mut cmd);

    if release {
        cmd.arg("--release");
    }

    execute_command(&mut cmd)
}

fn run_test(lib: bool, suite: Option<Suite>, cases: Option<u32>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test");
    feature_args(&mut cmd);

    if lib {
        cmd.arg("--lib");
    } else if let Some(suite) = suite {
        println!("{} Running {} suite...", "→".blue(), suite.target().bold());
        cmd.arg("--test").arg(suite.target());
    }

    if let Some(cases) = cases {
        cmd.env("PROPTEST_CASES", cases.to_string());
    }

    execute_command(&mut cmd)
}

fn run_validate(rom_path: &str, console: &str) -> Result<()> {
    if !std::path::Path::new(rom_path).exists() {
        println!(
            "{} ROM file not found: {}",
            "✗".red().bold(),
            rom_path.yellow()
        );
        anyhow::bail!("ROM file not found");
    }

    println!("{} ROM file: {}", "✓".green(), rom_path.cyan());

    let mut cmd = Command::new("cargo");
    cmd.arg("run")
        .arg("--no-default-features")
        .arg("--")
        .arg("validate")
        .arg(rom_path)
        .arg("--console")
        .arg(console);

    execute_command(&mut cmd)
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);

    let start = Instant::now();

    match task() {
        Ok(_) => {
            let timing = if verbose {
                format!("({:.2}s)", start.elapsed().as_secs_f64())
            } else {
                String::new()
            };
            println!("{} {}", "✓".green().bold(), timing);
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }

    Ok(())
}
