//! # Experiment Runner
//!
//! Trains and/or evaluates the configured controller and writes the results
//! into `<out_dir>/<exp_ID>/`:
//!
//! -   `training_performance.tsv`, one row per training episode;
//! -   `learned_qtables/QLearningAgent_values.ep{N}.qtable`, the value table
//!     after each training episode;
//! -   `testing_perf.<exp_ID>.tsv`, the evaluation summary;
//! -   `testing.<exp_ID>.tsv`, the evaluation trajectory.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rl::{
    write_testing_perf, write_trajectory, Action, Agent, BacterialEnv, CheckpointDir, EpisodeSummary, FixedDose,
    QLearningAgent, TrainTest, TsvReport,
};
use tracing::info;

use crate::config::{ControllerParams, ExperimentParams};

/// Evaluation switches, mirroring the command line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    /// Skip training and evaluate an existing checkpoint.
    pub test_only: bool,
    /// Stop the evaluation episode at the first terminal step.
    pub test_done_break: bool,
    /// Checkpoint to evaluate; the latest one on disk when `None`.
    pub test_qtable_episode: Option<usize>,
    pub test_explore_rate: f64,
}

pub struct Experiment {
    params: ExperimentParams,
    exp_dir: PathBuf,
}

impl Experiment {
    /// Prepares `<out_dir>/<exp_ID>/`.
    ///
    /// # Errors
    ///
    /// Invalid parameters or an uncreatable output directory.
    pub fn new(params: ExperimentParams, out_dir: &Path) -> Result<Self> {
        params.validate()?;
        let exp_dir = out_dir.join(&params.exp_id);
        fs::create_dir_all(&exp_dir).with_context(|| format!("creating {}", exp_dir.display()))?;
        Ok(Self { params, exp_dir })
    }

    #[must_use]
    pub fn exp_dir(&self) -> &Path {
        &self.exp_dir
    }

    #[must_use]
    pub fn params(&self) -> &ExperimentParams {
        &self.params
    }

    #[must_use]
    pub fn checkpoints(&self) -> CheckpointDir {
        CheckpointDir::new(self.exp_dir.join("learned_qtables"))
    }

    fn build_env(&self) -> Result<BacterialEnv> {
        let p = &self.params;
        let reward = p.reward.build()?;
        Ok(BacterialEnv::new(p.env.clone(), p.simulation.env_step_time, reward, p.state.clone())?)
    }

    fn build_agent(&self) -> Result<Agent> {
        Ok(match &self.params.controller {
            ControllerParams::Rational(agent) => Agent::from(*agent),
            ControllerParams::QLearning { agent, .. } => Agent::from(QLearningAgent::new(agent)?),
        })
    }

    /// Trains (unless `test_only`) and evaluates the configured controller.
    ///
    /// # Errors
    ///
    /// Any configuration, simulation or I/O failure.
    pub fn run(&self, options: &RunOptions) -> Result<EpisodeSummary> {
        let sim = &self.params.simulation;
        let mut tt = TrainTest::new(self.build_env()?, sim.sim_time, sim.reset);
        let mut agent = self.build_agent()?;
        info!(exp = %self.params.exp_id, agent = agent.name(), "running experiment");

        if let (ControllerParams::QLearning { training, .. }, Agent::QLearning(q)) =
            (&self.params.controller, &mut agent)
        {
            let checkpoints = self.checkpoints();
            let perf_path = self.exp_dir.join("training_performance.tsv");
            if !options.test_only {
                let mut report = TsvReport::new(BufWriter::new(File::create(&perf_path)?))?;
                tt.train(q, training, Some(&checkpoints), &mut report)?;
            } else if !perf_path.exists() {
                bail!("{} does not exist; run training first", perf_path.display());
            }

            let episode = match options.test_qtable_episode {
                Some(episode) if episode >= training.n_episodes => {
                    bail!("test_qtable_episode {episode} is not below n_episodes {}", training.n_episodes);
                }
                Some(episode) => episode,
                None => match checkpoints.latest()? {
                    Some(episode) => episode,
                    None => bail!("no checkpoints under {}", checkpoints.root().display()),
                },
            };
            let table = checkpoints
                .load(episode)
                .with_context(|| format!("loading {}", checkpoints.path_for(episode).display()))?;
            q.set_values(table)?;
            info!(episode, "evaluating learned values");
        }

        let summary = tt.test(&mut agent, options.test_explore_rate, options.test_done_break)?;
        self.export(&tt, &summary, "testing")?;
        Ok(summary)
    }

    /// Open-loop run applying `action` at every decision interval up to `horizon`.
    ///
    /// # Errors
    ///
    /// Simulation or I/O failure.
    pub fn simulate(&self, action: Action, horizon: f64) -> Result<EpisodeSummary> {
        let sim = &self.params.simulation;
        let mut tt = TrainTest::new(self.build_env()?, horizon, sim.reset);
        let mut policy = FixedDose(action);
        let summary = tt.test(&mut policy, 0.0, false)?;
        self.export(&tt, &summary, "simulate")?;
        Ok(summary)
    }

    fn export(&self, tt: &TrainTest<BacterialEnv>, summary: &EpisodeSummary, stem: &str) -> Result<()> {
        let id = &self.params.exp_id;
        let perf = self.exp_dir.join(format!("{stem}_perf.{id}.tsv"));
        let mut out = BufWriter::new(File::create(&perf)?);
        write_testing_perf(&mut out, id, summary)?;
        out.flush()?;
        let trajectory = self.exp_dir.join(format!("{stem}.{id}.tsv"));
        let mut out = BufWriter::new(File::create(&trajectory)?);
        write_trajectory(&mut out, tt.env().history())?;
        out.flush()?;
        info!(
            e_return = summary.e_return,
            t5p = ?summary.first_five_percent,
            t_tiny = ?summary.first_tiny,
            total_drug_in = summary.total_drug_in,
            "wrote {}",
            trajectory.display()
        );
        Ok(())
    }
}
