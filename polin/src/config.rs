//! # Experiment Parameters
//!
//! One JSON file describes an experiment: the environment, the decision
//! interval and horizon, the reward, the observation scheme and the
//! controller.
//!
//! ```json
//! {
//!   "exp_ID": "E01",
//!   "exp_name": "minED on disc_E",
//!   "env": { "ode_params": { "rE": 0.02, ... }, "initial_conditions": { "E": 0.5, "Z": 0.5, "D": 0.0 } },
//!   "simulation": { "env_step_time": 360.0, "sim_time": 2100.0 },
//!   "reward": { "name": "minED", "w_E": 1.0, "Din_max": 100.0, "w_D": 0.2 },
//!   "state": { "method": "disc_E", "n_states": 12 },
//!   "controller": {
//!     "type_name": "QLearning",
//!     "agent": { "n_states": 12, "n_actions": 2, "Din_options": [0.0, 100.0] },
//!     "training": { "n_episodes": 500, "decay": 50.0, "episode_time_max": 2100.0 }
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use dynamics::EnvParams;
use rl::{QLearningConfig, RationalAgent, ResetKind, RewardConfig, StateMethod, TrainingConfig};
use serde::{Deserialize, Serialize};

fn default_step_time() -> f64 {
    360.0
}

fn default_sim_time() -> f64 {
    2100.0
}

fn default_state() -> StateMethod {
    StateMethod::ContinuousE
}

/// Time budgets in minutes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SimulationParams {
    /// Length of one decision interval.
    #[serde(default = "default_step_time")]
    pub env_step_time: f64,
    /// Horizon of evaluation runs.
    #[serde(default = "default_sim_time")]
    pub sim_time: f64,
    #[serde(default)]
    pub reset: ResetKind,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self { env_step_time: default_step_time(), sim_time: default_sim_time(), reset: ResetKind::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type_name")]
pub enum ControllerParams {
    Rational(RationalAgent),
    QLearning { agent: QLearningConfig, training: TrainingConfig },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExperimentParams {
    #[serde(rename = "exp_ID")]
    pub exp_id: String,
    #[serde(default)]
    pub exp_name: String,
    pub env: EnvParams,
    #[serde(default)]
    pub simulation: SimulationParams,
    pub reward: RewardConfig,
    #[serde(default = "default_state")]
    pub state: StateMethod,
    pub controller: ControllerParams,
}

impl ExperimentParams {
    /// Reads and validates a parameter file.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed files and inconsistent settings.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let params: Self = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    /// Cross-checks sections that must agree with each other.
    ///
    /// # Errors
    ///
    /// Describes the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.exp_id.is_empty() || self.exp_id.contains(['/', '\\']) {
            bail!("exp_ID must be a non-empty plain name, got {:?}", self.exp_id);
        }
        self.env.validate()?;
        self.state.validate()?;
        let sim = &self.simulation;
        if !(sim.env_step_time > 0.0 && sim.sim_time.is_finite()) {
            bail!("simulation times must be positive and finite");
        }
        if let ControllerParams::QLearning { agent, training } = &self.controller {
            let Some(n_states) = self.state.n_states() else {
                bail!("the QLearning controller needs a discrete state method");
            };
            if n_states != agent.n_states {
                bail!("state method has {n_states} states but the agent expects {}", agent.n_states);
            }
            if training.n_episodes == 0 {
                bail!("training needs at least one episode");
            }
            training.explore_schedule().rate(0)?;
        }
        Ok(())
    }
}
