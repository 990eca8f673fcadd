//! ucharm build tool
//!
//! Turns a script plus an interpreter into one self-contained executable,
//! and inspects the result.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::build::BuildArgs;
use config::ProjectConfig;
use output::{resolve_color_choice, StyledOutput};
use ucharm_runtime::Cache;

#[derive(Parser)]
#[command(name = "ucharm")]
#[command(about = "Build single-file executables from scripts", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors: auto, always, never
    #[arg(long, global = true, value_parser = ["auto", "always", "never"])]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a standalone executable
    Build {
        /// Script to embed
        script: PathBuf,
        /// Output file path (defaults to the script name without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Interpreter executable to embed
        #[arg(long)]
        interpreter: Option<PathBuf>,
        /// Loader stub to prepend
        #[arg(long)]
        stub: Option<PathBuf>,
    },

    /// Show the layout and cache key of a built executable
    Inspect {
        /// Built executable
        binary: PathBuf,
    },

    /// Extraction cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print the cache root, or the entry a binary extracts to
    Path {
        /// Built executable
        binary: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("UCHARM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: Cli, out: &mut StyledOutput) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build { script, output, interpreter, stub } => {
            let cwd = std::env::current_dir()?;
            let config = ProjectConfig::load_optional(&cwd)?;
            commands::build::execute(
                BuildArgs { script, output, interpreter, stub },
                &config.build,
                out,
            )
        }

        Commands::Inspect { binary } => commands::inspect::execute(&binary, out),

        Commands::Cache { command } => match command {
            CacheCommands::Path { binary } => {
                commands::cache::path(binary.as_deref(), &Cache::user_default(), out)
            }
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
    if let Err(e) = run(cli, &mut out) {
        out.stderr_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
