use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "record-etl")]
#[command(about = "Extract CSV, JSON and XML records, normalize them and load the result")]
#[command(version)]
struct Cli {
    /// Log file written in addition to the console
    #[arg(long, global = true, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision infrastructure and run the full pipeline
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Validate inputs only, run nothing
        #[arg(long)]
        dry_run: bool,
        /// Read the sources of each format concurrently
        #[arg(long)]
        parallel: bool,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Check the configuration and that every input file exists
    Validate {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Ensure the infrastructure exists without running the pipeline
    Provision {
        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Arguments shared by every subcommand
#[derive(Args, Clone)]
pub struct CommonArgs {
    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory holding the input files
    #[arg(long)]
    pub data_root: Option<PathBuf>,
    /// Directory for the staging file and run record
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Use in-process collaborators instead of AWS
    #[arg(long)]
    pub local: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });

    let _guard = match logging::init_logging(&cli.log_file, verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            common,
            dry_run,
            parallel,
            verbose,
        } => commands::handle_run(&common, dry_run, parallel, verbose),
        Commands::Validate { common } => commands::handle_validate(&common),
        Commands::Provision { common } => commands::handle_provision(&common),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
