#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives Skirmish games.

mod config;
mod service;
mod session;
mod simulation;

use std::{
    io,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skirmish_core::{ManualClock, SystemClock};
use skirmish_system_rules::SharedRng;

use crate::{config::GameConfig, service::GameService};

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn-based grid combat engine", long_about = None)]
struct Args {
    /// Path to the TOML game configuration
    #[arg(long, default_value = "skirmish.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    /// Seed for reproducible placement and random commands
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Read commands from standard input, one per line
    Play,
    /// Let both sides issue random commands for a number of rounds
    Simulate {
        /// Number of rounds to play
        #[arg(long, default_value_t = 20)]
        rounds: u32,

        /// Seconds the clock advances after each round
        #[arg(long, default_value_t = 5)]
        round_seconds: u64,
    },
}

/// Entry point for the Skirmish command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp(None)
        .init();

    let config = GameConfig::load(&args.config)?;
    let rng = args
        .seed
        .map_or_else(SharedRng::from_entropy, SharedRng::seeded);

    match args.mode {
        Mode::Play => {
            let service = GameService::new(config, rng, Arc::new(SystemClock));
            let stdin = io::stdin();
            session::run(&service, stdin.lock(), io::stdout().lock())
                .context("interactive session failed")
        }
        Mode::Simulate {
            rounds,
            round_seconds,
        } => {
            let clock = Arc::new(ManualClock::starting_at(SystemTime::now()));
            let service = GameService::new(config, rng, clock.clone());
            let report = simulation::run(
                &service,
                &clock,
                rounds,
                Duration::from_secs(round_seconds),
            )?;
            let json = serde_json::to_string_pretty(&report)
                .context("failed to encode simulation report")?;
            println!("{json}");
            Ok(())
        }
    }
}
