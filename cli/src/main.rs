//! Corral CLI binary
//!
//! Runs a roster of long-lived worker processes in the foreground.

use clap::{Parser, Subcommand};
use cli::{
    build_supervisor, failure_report, load_roster, recent_output, roster_schema_json,
    roster_summary, run_supervisor, unbounded_shutdown_warning,
};
use corral_core::CancellationToken;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "Supervise long-running worker processes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every worker in the roster until one stops or a signal arrives
    Run {
        /// Path to the TOML roster
        #[arg(long, short, value_name = "FILE")]
        config: PathBuf,

        /// Output lines of a failed worker to print on exit (0 disables)
        #[arg(long, default_value_t = 20, value_name = "LINES")]
        tail: usize,
    },
    /// Validate a roster and print what it would run
    Check {
        /// Path to the TOML roster
        #[arg(long, short, value_name = "FILE")]
        config: PathBuf,
    },
    /// Print the JSON Schema of the roster format
    Schema,
}

async fn run(args: Cli) -> cli::Result<()> {
    match args.command {
        Commands::Run { config, tail } => {
            let roster = load_roster(&config)?;
            info!("Loaded {} workers from {:?}", roster.workers.len(), config);
            if let Some(message) = unbounded_shutdown_warning(&roster) {
                warn!("{}", message);
            }
            let recent = recent_output(&roster, tail);
            let supervisor = build_supervisor(&roster, recent.clone());

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                match cli::wait_for_shutdown_signal().await {
                    Ok(()) => info!("Shutting down workers..."),
                    Err(e) => error!("{}; shutting down", e),
                }
                on_signal.cancel();
            });

            let outcome = run_supervisor(supervisor, cancel).await;
            if let (Err(e), Some(ring)) = (&outcome, &recent) {
                if let Some(report) = failure_report(e, ring, tail) {
                    eprint!("{}", report);
                }
            }
            outcome
        }
        Commands::Check { config } => {
            let roster = load_roster(&config)?;
            print!("{}", roster_summary(&roster));
            Ok(())
        }
        Commands::Schema => {
            println!("{}", roster_schema_json()?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = corral_core::utils::init_tracing(&args.log_level) {
        eprintln!("{}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}
