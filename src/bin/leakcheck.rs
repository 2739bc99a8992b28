//! leakcheck - verify public headers do not leak internal dependencies
//!
//! Usage:
//!   leakcheck check                      # read ./leakcheck.yaml, exit 1 on any leak
//!   leakcheck check --format json        # machine-readable report
//!   leakcheck check -I third_party/include -D NDEBUG
//!   leakcheck list                       # show the registry and the public headers
//!   leakcheck list --macros              # ...plus every macro the public headers expose
//!   leakcheck self-test                  # prove each marker is detectable
//!
//! Exit codes: 0 clean, 1 leak (or self-test miss), 2 configuration or build failure.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use header_leak_guard::{
    run_all, verify_detection, Define, FsSource, LeakageProbe, MutationStatus,
    ProbeConfig, CONFIG_ENV, DEFAULT_MANIFEST,
};

const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "leakcheck")]
#[command(about = "Verify that public headers never expose internal dependency markers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Preprocess the public headers and check every forbidden marker
    Check {
        #[command(flatten)]
        target: TargetArgs,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the forbidden markers and the public headers
    List {
        #[command(flatten)]
        target: TargetArgs,

        /// Also preprocess the headers and print every macro they expose
        #[arg(long)]
        macros: bool,
    },

    /// Inject each dependency header into each public header and confirm detection
    SelfTest {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Manifest describing headers and forbidden markers
    #[arg(long, short = 'c', env = CONFIG_ENV, default_value = DEFAULT_MANIFEST)]
    config: PathBuf,

    /// Additional include directory (searched after the manifest's)
    #[arg(long = "include-dir", short = 'I')]
    include_dirs: Vec<PathBuf>,

    /// Predefined macro, NAME or NAME=VALUE
    #[arg(long = "define", short = 'D')]
    defines: Vec<Define>,
}

impl TargetArgs {
    fn load(self) -> Result<ProbeConfig> {
        let mut config = ProbeConfig::load(&self.config)
            .with_context(|| format!("Failed to load manifest {}", self.config.display()))?;
        config.add_include_dirs(self.include_dirs);
        config.add_defines(self.defines);
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leakcheck=info,header_leak_guard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Check { target, format } => check(target, format),
        Command::List { target, macros } => list(target, macros),
        Command::SelfTest { target } => self_test(target),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn check(target: TargetArgs, format: OutputFormat) -> Result<u8> {
    let config = target.load()?;
    let probe = LeakageProbe::compile(&config.aggregate, &FsSource, &config.options)
        .context("Public headers failed to preprocess")?;
    let report = run_all(&probe, &config.registry);

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.render_text(std::io::stdout().is_terminal())),
    }
    Ok(report.exit_code())
}

fn list(target: TargetArgs, macros: bool) -> Result<u8> {
    let config = target.load()?;

    println!("Public headers ({}):", config.aggregate.len());
    for header in config.aggregate.headers() {
        println!("  {}", header);
    }
    println!("\nInclude directories:");
    for dir in config.aggregate.include_dirs() {
        println!("  {}", dir.display());
    }
    println!(
        "\nInternal dependencies: {}",
        config.registry.dependencies().join(", ")
    );
    println!("\nForbidden markers ({}):", config.registry.len());
    for entry in &config.registry {
        match &entry.header {
            Some(header) => println!(
                "  {:32} {} ({})",
                entry.name, entry.originating_dependency, header
            ),
            None => println!("  {:32} {}", entry.name, entry.originating_dependency),
        }
    }

    if macros {
        let probe = LeakageProbe::compile(&config.aggregate, &FsSource, &config.options)
            .context("Public headers failed to preprocess")?;
        let visible: Vec<_> = probe.unit().macros().collect();
        println!("\nVisible macros ({}):", visible.len());
        for def in visible {
            let name = format!("{:32}", def.name);
            let name = if config.registry.contains(&def.name) {
                name.as_str().red().bold()
            } else {
                name.as_str().normal()
            };
            println!("  {} {}", name, def.defined_at.to_string().as_str().dimmed());
        }
    }
    Ok(0)
}

fn self_test(target: TargetArgs) -> Result<u8> {
    let config = target.load()?;
    let report = verify_detection(
        &config.aggregate,
        &FsSource,
        &config.registry,
        &config.options,
    )
    .context("Public headers failed to resolve")?;

    println!("Detection self-test");
    println!("===================");
    for outcome in report.outcomes() {
        let status = match outcome.status {
            MutationStatus::Detected => "detected".green(),
            MutationStatus::Missed => "  MISSED".red().bold(),
            MutationStatus::BuildFailed { .. } => "   BUILD".red().bold(),
            MutationStatus::Skipped => " skipped".yellow(),
        };
        println!(
            "  [{}] {:32} -> {}",
            status,
            outcome.entry.name,
            outcome.injected_into.as_deref().unwrap_or("-")
        );
    }

    let diagnostics = report.diagnostics();
    if !diagnostics.is_empty() {
        println!();
        for d in &diagnostics {
            println!("  {}", d);
        }
    }

    if report.passed() {
        println!("\n{} every declared marker is detectable", "PASS".green().bold());
        Ok(0)
    } else {
        println!("\n{} some markers cannot detect their dependency", "FAIL".red().bold());
        Ok(1)
    }
}
