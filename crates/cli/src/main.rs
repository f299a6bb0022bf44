//! CLI for the Custody borrow manager.
//!
//! Runs contention workloads against a `SharedManager` and reports what the
//! admission protocol did.

mod report;
mod workload;

use clap::{Parser, Subcommand};
use custody_core::CustodyError;
use std::time::Duration;
use workload::TransferConfig;

#[derive(Parser, Debug)]
#[command(name = "custody", version, about = "Operation-scoped borrow manager workloads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Random two-account transfers across worker threads.
    Transfer {
        #[arg(short, long, env = "CUSTODY_ACCOUNTS", default_value_t = 16)]
        accounts: usize,

        #[arg(short, long, env = "CUSTODY_THREADS", default_value_t = 8)]
        threads: usize,

        /// Transfers per thread.
        #[arg(short, long, env = "CUSTODY_OPS", default_value_t = 1_000)]
        ops: usize,

        /// Microseconds spent inside each critical section.
        #[arg(long, env = "CUSTODY_HOLD_US", default_value_t = 0)]
        hold_us: u64,

        #[arg(long, env = "CUSTODY_SEED", default_value_t = 42)]
        seed: u64,

        #[arg(long, env = "CUSTODY_INITIAL_BALANCE", default_value_t = 1_000)]
        initial_balance: i64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Balance/traffic walkthrough: two disjoint borrows overlap, a combined
    /// borrow waits.
    Scenario {
        /// Milliseconds each critical section lasts.
        #[arg(long, env = "CUSTODY_HOLD_MS", default_value_t = 100)]
        hold_ms: u64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transfer {
            accounts,
            threads,
            ops,
            hold_us,
            seed,
            initial_balance,
            json,
        } => {
            let config = TransferConfig {
                accounts,
                threads,
                ops_per_thread: ops,
                hold: Duration::from_micros(hold_us),
                seed,
                initial_balance,
            };

            let outcome = workload::run_transfers(&config)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", outcome.render());
            }

            if !outcome.conserved() {
                return Err(CustodyError::Internal(format!(
                    "total balance drifted: expected {}, found {}",
                    config.expected_total(),
                    outcome.final_total
                ))
                .into());
            }
        }
        Commands::Scenario { hold_ms, json } => {
            tracing::info!(hold_ms, "running balance/traffic scenario");
            let outcome = workload::run_scenario(Duration::from_millis(hold_ms))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", outcome.render());
            }
        }
    }

    Ok(())
}
