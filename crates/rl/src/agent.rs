//! Uniform controller interface over the learned and the baseline policy.
//!
//! The concrete policy is fixed when an [`Agent`] is built; the episode loop
//! only talks to [`Controller`].

use crate::env::Action;
use crate::error::AgentError;
use crate::observation::Observation;
use crate::qlearning::{QLearningAgent, Transition};
use crate::rational::RationalAgent;

/// A chosen action; `action_index` is set for tabular policies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub action_index: Option<usize>,
    pub action: Action,
}

pub trait Controller {
    /// # Errors
    ///
    /// When the observation cannot be used by this policy.
    fn decide(&mut self, observation: &Observation, explore_rate: f64) -> Result<Decision, AgentError>;

    /// Whether [`Controller::learn`] changes anything.
    fn is_learning(&self) -> bool;

    /// # Errors
    ///
    /// Invalid transition indices.
    fn learn(&mut self, _transition: &Transition) -> Result<(), AgentError> {
        Ok(())
    }
}

impl Controller for RationalAgent {
    fn decide(&mut self, observation: &Observation, _explore_rate: f64) -> Result<Decision, AgentError> {
        let action = match observation {
            Observation::Continuous(e) => self.get_action(*e),
            discrete => self.get_action(if discrete.focal_present() { 1.0 } else { 0.0 }),
        };
        Ok(Decision { action_index: None, action })
    }

    fn is_learning(&self) -> bool {
        false
    }
}

impl Controller for QLearningAgent {
    fn decide(&mut self, observation: &Observation, explore_rate: f64) -> Result<Decision, AgentError> {
        let state = observation.index().ok_or(AgentError::ContinuousObservation)?;
        let (index, action) = self.get_action(state, explore_rate)?;
        Ok(Decision { action_index: Some(index), action })
    }

    fn is_learning(&self) -> bool {
        true
    }

    fn learn(&mut self, transition: &Transition) -> Result<(), AgentError> {
        self.update_values(transition)
    }
}

/// Open-loop policy applying the same action at every step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedDose(pub Action);

impl Controller for FixedDose {
    fn decide(&mut self, _observation: &Observation, _explore_rate: f64) -> Result<Decision, AgentError> {
        Ok(Decision { action_index: None, action: self.0 })
    }

    fn is_learning(&self) -> bool {
        false
    }
}

pub enum Agent {
    QLearning(QLearningAgent),
    Rational(RationalAgent),
}

impl Agent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::QLearning(_) => "QLearningAgent",
            Self::Rational(_) => "RationalAgent",
        }
    }
}

impl From<QLearningAgent> for Agent {
    fn from(agent: QLearningAgent) -> Self {
        Self::QLearning(agent)
    }
}

impl From<RationalAgent> for Agent {
    fn from(agent: RationalAgent) -> Self {
        Self::Rational(agent)
    }
}

impl Controller for Agent {
    fn decide(&mut self, observation: &Observation, explore_rate: f64) -> Result<Decision, AgentError> {
        match self {
            Self::QLearning(agent) => agent.decide(observation, explore_rate),
            Self::Rational(agent) => agent.decide(observation, explore_rate),
        }
    }

    fn is_learning(&self) -> bool {
        match self {
            Self::QLearning(agent) => agent.is_learning(),
            Self::Rational(agent) => agent.is_learning(),
        }
    }

    fn learn(&mut self, transition: &Transition) -> Result<(), AgentError> {
        match self {
            Self::QLearning(agent) => agent.learn(transition),
            Self::Rational(agent) => agent.learn(transition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qlearning::QLearningConfig;
    use crate::qtable::TieBreak;

    #[test]
    fn tabular_agent_needs_discrete_observation() {
        let cfg = QLearningConfig {
            n_states: 3,
            n_actions: 1,
            din_options: vec![10.0],
            drug_time: 60.0,
            gamma: 0.9,
            alpha: 0.01,
            tie_break: TieBreak::First,
            seed: 0,
        };
        let mut agent = Agent::from(QLearningAgent::new(&cfg).unwrap());
        assert!(agent.is_learning());
        assert_eq!(agent.decide(&Observation::Continuous(0.5), 0.0), Err(AgentError::ContinuousObservation));
        let d = agent.decide(&Observation::Discrete { index: 2, focal_bin: 2 }, 0.0).unwrap();
        assert_eq!(d, Decision { action_index: Some(0), action: Action::new(10.0, 60.0) });
    }

    #[test]
    fn rational_agent_reads_discrete_focal_bin() {
        let mut agent = Agent::from(RationalAgent::default());
        assert!(!agent.is_learning());
        let off = agent.decide(&Observation::Discrete { index: 3, focal_bin: 0 }, 0.0).unwrap();
        assert_eq!(off.action, Action::new(0.0, 180.0));
        let on = agent.decide(&Observation::Discrete { index: 4, focal_bin: 1 }, 0.0).unwrap();
        assert_eq!(on.action, Action::new(100.0, 180.0));
    }
}
