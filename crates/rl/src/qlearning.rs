//! # Tabular Q-learning
//!
//! Epsilon-greedy control over a fixed set of inflow concentrations, all
//! applied for the same duration, with the one-step update
//!
//! ```text
//! Q[s,a] += alpha (r + gamma max_a' Q[s',a'] (1 - done) - Q[s,a])
//! ```

use serde::{Deserialize, Serialize};

use crate::env::Action;
use crate::error::AgentError;
use crate::qtable::{QTable, TieBreak};

fn default_drug_time() -> f64 {
    180.0
}

fn default_gamma() -> f64 {
    0.9
}

fn default_alpha() -> f64 {
    0.01
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QLearningConfig {
    pub n_states: usize,
    pub n_actions: usize,
    /// Candidate inflow concentrations, one per action.
    #[serde(rename = "Din_options")]
    pub din_options: Vec<f64>,
    #[serde(default = "default_drug_time")]
    pub drug_time: f64,
    /// Discount rate.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Learning rate.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Seed of the exploration RNG.
    #[serde(default)]
    pub seed: u64,
}

/// One observed step: `(s, a, r, s', done)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub state: usize,
    pub action: usize,
    pub reward: f64,
    pub next_state: usize,
    pub done: bool,
}

/// Logarithmically decaying rate `clamp(1 - log10((episode + 1) / decay), min_r, max_r)`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct RateSchedule {
    pub decay: f64,
    #[serde(default)]
    pub min_r: f64,
    #[serde(default = "one")]
    pub max_r: f64,
}

fn one() -> f64 {
    1.0
}

impl RateSchedule {
    /// # Errors
    ///
    /// See [`QLearningAgent::get_rate`].
    pub fn rate(&self, episode: usize) -> Result<f64, AgentError> {
        QLearningAgent::get_rate(episode, self.decay, self.min_r, self.max_r)
    }
}

pub struct QLearningAgent {
    values: QTable,
    din_options: Vec<f64>,
    drug_time: f64,
    gamma: f64,
    alpha: f64,
    tie_break: TieBreak,
    rng: fastrand::Rng,
}

impl QLearningAgent {
    /// Zero-initialised agent.
    ///
    /// # Errors
    ///
    /// [`AgentError::ActionCountMismatch`] when the dose options do not match
    /// the action count, [`AgentError::InvalidRate`] for rates outside `[0, 1]`.
    pub fn new(config: &QLearningConfig) -> Result<Self, AgentError> {
        if config.din_options.len() != config.n_actions {
            return Err(AgentError::ActionCountMismatch {
                n_actions: config.n_actions,
                n_options: config.din_options.len(),
            });
        }
        check_unit("gamma", config.gamma)?;
        check_unit("alpha", config.alpha)?;
        Ok(Self {
            values: QTable::zeros(config.n_states, config.n_actions),
            din_options: config.din_options.clone(),
            drug_time: config.drug_time,
            gamma: config.gamma,
            alpha: config.alpha,
            tie_break: config.tie_break,
            rng: fastrand::Rng::with_seed(config.seed),
        })
    }

    /// Epsilon-greedy choice for `state`, returned both as an index and as
    /// the dose it stands for.
    ///
    /// # Errors
    ///
    /// [`AgentError::StateOutOfRange`].
    pub fn get_action(&mut self, state: usize, explore_rate: f64) -> Result<(usize, Action), AgentError> {
        let n_actions = self.values.n_actions();
        let index = if n_actions > 0 && self.rng.f64() < explore_rate {
            self.values.row(state)?;
            self.rng.usize(..n_actions)
        } else {
            self.values.argmax(state, self.tie_break, &mut self.rng)?
        };
        let din = *self
            .din_options
            .get(index)
            .ok_or(AgentError::ActionOutOfRange { action: index, n_actions: self.din_options.len() })?;
        Ok((index, Action::new(din, self.drug_time)))
    }

    /// One temporal-difference update. A terminal transition bootstraps
    /// nothing from `next_state`.
    ///
    /// # Errors
    ///
    /// Out-of-range state or action indices.
    pub fn update_values(&mut self, t: &Transition) -> Result<(), AgentError> {
        let q = self.values.get(t.state, t.action)?;
        let future = if t.done { 0.0 } else { self.gamma * self.values.max(t.next_state)? };
        self.values.set(t.state, t.action, q + self.alpha * (t.reward + future - q))
    }

    /// `clamp(1 - log10((episode + 1) / decay), min_r, max_r)`.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidRate`] when `min_r` or `max_r` is outside `[0, 1]`
    /// or `decay <= 0`.
    pub fn get_rate(episode: usize, decay: f64, min_r: f64, max_r: f64) -> Result<f64, AgentError> {
        check_unit("min_r", min_r)?;
        check_unit("max_r", max_r)?;
        if decay.is_nan() || decay <= 0.0 {
            return Err(AgentError::InvalidRate { name: "decay", value: decay });
        }
        let raw = 1.0 - ((episode as f64 + 1.0) / decay).log10();
        Ok(raw.min(max_r).max(min_r))
    }

    /// Replaces the table and adopts its shape.
    ///
    /// # Errors
    ///
    /// [`AgentError::ActionCountMismatch`] when the table's action count no
    /// longer matches the dose options.
    pub fn set_values(&mut self, table: QTable) -> Result<(), AgentError> {
        if table.n_actions() != self.din_options.len() {
            return Err(AgentError::ActionCountMismatch {
                n_actions: table.n_actions(),
                n_options: self.din_options.len(),
            });
        }
        self.values = table;
        Ok(())
    }

    #[must_use]
    pub fn values(&self) -> &QTable {
        &self.values
    }

    #[must_use]
    pub fn n_states(&self) -> usize {
        self.values.n_states()
    }

    #[must_use]
    pub fn n_actions(&self) -> usize {
        self.values.n_actions()
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// # Errors
    ///
    /// [`AgentError::InvalidRate`] outside `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f64) -> Result<(), AgentError> {
        check_unit("alpha", alpha)?;
        self.alpha = alpha;
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), AgentError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AgentError::InvalidRate { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> QLearningConfig {
        QLearningConfig {
            n_states: 4,
            n_actions: 2,
            din_options: vec![0.0, 100.0],
            drug_time: 180.0,
            gamma: 0.9,
            alpha: 0.5,
            tie_break: TieBreak::First,
            seed: 1,
        }
    }

    #[test]
    fn option_count_must_match() {
        let mut cfg = config();
        cfg.din_options.push(50.0);
        assert!(matches!(QLearningAgent::new(&cfg), Err(AgentError::ActionCountMismatch { .. })));
    }

    #[test]
    fn non_terminal_update_bootstraps() {
        let mut agent = QLearningAgent::new(&config()).unwrap();
        agent.set_values(QTable::from_vec(4, 2, vec![1.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0]).unwrap()).unwrap();
        agent.update_values(&Transition { state: 0, action: 0, reward: 2.0, next_state: 2, done: false }).unwrap();
        // 1 + 0.5 (2 + 0.9 * 4 - 1)
        assert!((agent.values().get(0, 0).unwrap() - 3.3).abs() < 1e-12);
    }

    #[test]
    fn greedy_action_materialises_dose() {
        let mut agent = QLearningAgent::new(&config()).unwrap();
        agent.set_values(QTable::from_vec(4, 2, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap()).unwrap();
        assert_eq!(agent.get_action(0, 0.0).unwrap(), (1, Action::new(100.0, 180.0)));
        assert_eq!(agent.get_action(1, 0.0).unwrap(), (0, Action::new(0.0, 180.0)));
        assert!(agent.get_action(4, 0.0).is_err());
    }

    #[test]
    fn full_exploration_visits_every_action() {
        let mut agent = QLearningAgent::new(&config()).unwrap();
        let mut seen = [false; 2];
        for _ in 0..100 {
            seen[agent.get_action(0, 1.0).unwrap().0] = true;
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn set_values_adopts_shape() {
        let mut agent = QLearningAgent::new(&config()).unwrap();
        agent.set_values(QTable::zeros(9, 2)).unwrap();
        assert_eq!(agent.n_states(), 9);
        assert!(agent.set_values(QTable::zeros(9, 3)).is_err());
    }

    #[test]
    fn rate_validation() {
        assert!(QLearningAgent::get_rate(0, 0.0, 0.0, 1.0).is_err());
        assert!(QLearningAgent::get_rate(0, 1.0, -0.1, 1.0).is_err());
        assert!(QLearningAgent::get_rate(0, 1.0, 0.0, 1.5).is_err());
        assert!(QLearningAgent::get_rate(99, 10.0, 0.0, 1.0).unwrap().abs() < 1e-12);
    }
}
