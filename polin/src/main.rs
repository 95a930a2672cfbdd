//! # POLIN Runtime
//!
//! Command-line entry point for running dosing experiments.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use polin::app::{Experiment, RunOptions};
use polin::config::ExperimentParams;
use rl::Action;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "polin")]
#[command(about = "Antibiotic dosing experiments on a simulated co-culture", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train (for Q-learning) and evaluate the configured controller
    Run {
        /// JSON experiment parameter file
        #[arg(short = 'f', long)]
        exp_param_file: PathBuf,

        /// Directory receiving `<exp_ID>/`
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Evaluate an existing checkpoint without training
        #[arg(long)]
        test_only: bool,

        /// Stop the evaluation episode at the first terminal step
        #[arg(long)]
        test_done_break: bool,

        /// Checkpoint episode to evaluate (default: latest on disk)
        #[arg(long)]
        test_qtable_episode: Option<usize>,

        /// Exploration rate during evaluation
        #[arg(long, default_value_t = 0.0)]
        test_explore_rate: f64,
    },
    /// Apply one fixed dose at every decision interval
    Simulate {
        /// JSON experiment parameter file
        #[arg(short = 'f', long)]
        exp_param_file: PathBuf,

        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Inflow drug concentration
        #[arg(long, default_value_t = 100.0)]
        din: f64,

        /// Minutes of inflow at the start of each interval
        #[arg(long, default_value_t = 180.0)]
        drug_time: f64,

        /// Simulated minutes (default: the file's sim_time)
        #[arg(long)]
        horizon: Option<f64>,
    },
}

fn build_env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(build_env_filter(cli.debug)).init();

    match cli.command {
        Command::Run {
            exp_param_file,
            out_dir,
            test_only,
            test_done_break,
            test_qtable_episode,
            test_explore_rate,
        } => {
            tracing::info!("Parsing experiment parameters from {}", exp_param_file.display());
            let exp = Experiment::new(ExperimentParams::from_file(&exp_param_file)?, &out_dir)?;
            let options = RunOptions { test_only, test_done_break, test_qtable_episode, test_explore_rate };
            let summary = exp.run(&options)?;
            tracing::info!(e_return = summary.e_return, "experiment finished in {}", exp.exp_dir().display());
        }
        Command::Simulate { exp_param_file, out_dir, din, drug_time, horizon } => {
            let exp = Experiment::new(ExperimentParams::from_file(&exp_param_file)?, &out_dir)?;
            let horizon = horizon.unwrap_or(exp.params().simulation.sim_time);
            let summary = exp.simulate(Action::new(din, drug_time), horizon)?;
            tracing::info!(
                total_drug_in = summary.total_drug_in,
                "simulation finished in {}",
                exp.exp_dir().display()
            );
        }
    }
    Ok(())
}
