//! CLI entry point for the WhackRock rebalancer.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use whackrock::DEFAULT_TOLERANCE;
use whackrock_rebalancer::config::Config;
use whackrock_rebalancer::error::Error;
use whackrock_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Signal-driven weight rebalancer for a WhackRock fund")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive weights, decide, confirm, and submit a rebalance
    Run {
        /// Path to the signal document (JSON)
        #[arg(long)]
        signal: PathBuf,

        /// Show plan without submitting
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Show the fund's composition against its stored target
    Composition,

    /// Normalize fractional weights to basis points
    Normalize {
        /// Weights in fund order, e.g. 0.5 0.3 0.2
        #[arg(required = true, allow_negative_numbers = true)]
        weights: Vec<f64>,

        /// Allowed distance of the weight sum from 1.0
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },

    /// List processed signals
    History,
}

fn load_config(path: &Path) -> Config {
    match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            signal,
            dry_run,
            force,
        } => {
            let config = load_config(&cli.config);
            let opts = RunOptions {
                dry_run,
                force,
                signal_file: signal.display().to_string(),
            };
            execution::run(&config, &opts).map(|_| ())
        }
        Command::Composition => execution::show_composition(&load_config(&cli.config)),
        Command::Normalize { weights, tolerance } => execution::show_normalized(weights, tolerance),
        Command::History => execution::show_history(&load_config(&cli.config)),
    };

    if let Err(e) = result {
        match &e {
            Error::RiskFailed(msg) => {
                eprintln!("\nAborted: {msg}");
                process::exit(2);
            }
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                log::error!("{e}");
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
