//! Reward functions evaluated after every environment step.

use dynamics::State;
use serde::{Deserialize, Serialize};

use crate::env::Action;
use crate::error::EnvError;

/// Scores the latest step from the applied action and the full trajectory.
///
/// `states[0]` is the episode's starting point and `states.last()` the state
/// reached by the step; `times` is aligned with `states`.
pub trait RewardFn {
    fn evaluate(&self, action: &Action, states: &[State], times: &[f64]) -> (f64, bool);
}

impl<F> RewardFn for F
where
    F: Fn(&Action, &[State], &[f64]) -> (f64, bool),
{
    fn evaluate(&self, action: &Action, states: &[State], times: &[f64]) -> (f64, bool) {
        self(action, states, times)
    }
}

/// When a reward reports the episode as finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Done exactly when the focal density is back at its starting value,
    /// i.e. the treatment had no lasting effect.
    #[default]
    ReturnToInitial,
    /// Never done; episodes always run to the horizon.
    Never,
}

/// Weighted trade-off between suppression of the focal species and the
/// dose spent on it:
///
/// ```text
/// reward = w_E (1 - E / E0) - w_D Din / Din_max
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinEd {
    pub w_e: f64,
    pub din_max: f64,
    pub w_d: f64,
    pub termination: Termination,
}

impl RewardFn for MinEd {
    fn evaluate(&self, action: &Action, states: &[State], _times: &[f64]) -> (f64, bool) {
        let (Some(first), Some(last)) = (states.first(), states.last()) else {
            return (0.0, false);
        };
        let suppression = if first.e == 0.0 { 0.0 } else { 1.0 - last.e / first.e };
        let reward = self.w_e * suppression - self.w_d * action.din / self.din_max;
        let done = match self.termination {
            Termination::ReturnToInitial => last.e == first.e,
            Termination::Never => false,
        };
        (reward, done)
    }
}

/// Reward selected by name, with its keyword parameters.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "name")]
pub enum RewardConfig {
    #[serde(rename = "minED")]
    MinEd {
        #[serde(rename = "w_E")]
        w_e: f64,
        #[serde(rename = "Din_max")]
        din_max: f64,
        #[serde(rename = "w_D")]
        w_d: f64,
        #[serde(default)]
        termination: Termination,
    },
}

impl RewardConfig {
    /// # Errors
    ///
    /// [`EnvError::InvalidReward`] for non-finite weights or a non-positive
    /// dose normaliser.
    pub fn build(&self) -> Result<Box<dyn RewardFn>, EnvError> {
        match *self {
            Self::MinEd { w_e, din_max, w_d, termination } => {
                if !(w_e.is_finite() && w_d.is_finite()) {
                    return Err(EnvError::InvalidReward { name: "minED", reason: "weights must be finite" });
                }
                if !(din_max.is_finite() && din_max > 0.0) {
                    return Err(EnvError::InvalidReward { name: "minED", reason: "Din_max must be > 0" });
                }
                Ok(Box::new(MinEd { w_e, din_max, w_d, termination }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn min_ed(termination: Termination) -> MinEd {
        MinEd { w_e: 1.0, din_max: 200.0, w_d: 0.5, termination }
    }

    #[test]
    fn rewards_suppression_and_penalises_dose() {
        let states = [State::new(0.8, 0.3, 0.0), State::new(0.2, 0.5, 4.0)];
        let action = Action::new(100.0, 180.0);
        let (r, done) = min_ed(Termination::ReturnToInitial).evaluate(&action, &states, &[0.0, 360.0]);
        assert_relative_eq!(r, 0.75 - 0.25, epsilon = 1e-12);
        assert!(!done);
    }

    #[test]
    fn return_to_initial_terminates() {
        let states = [State::new(0.8, 0.3, 0.0), State::new(0.8, 0.3, 0.0)];
        let action = Action::new(0.0, 180.0);
        assert_eq!(min_ed(Termination::ReturnToInitial).evaluate(&action, &states, &[0.0, 360.0]), (0.0, true));
        assert_eq!(min_ed(Termination::Never).evaluate(&action, &states, &[0.0, 360.0]), (0.0, false));
    }

    #[test]
    fn builds_from_named_config() {
        let cfg: RewardConfig =
            serde_json::from_str(r#"{"name": "minED", "w_E": 1.0, "Din_max": 200.0, "w_D": 0.5}"#).unwrap();
        let reward = cfg.build().unwrap();
        let states = [State::new(1.0, 0.0, 0.0), State::new(0.5, 0.0, 0.0)];
        let (r, _) = reward.evaluate(&Action::new(0.0, 0.0), &states, &[0.0, 1.0]);
        assert_relative_eq!(r, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rejects_zero_normaliser() {
        let cfg = RewardConfig::MinEd { w_e: 1.0, din_max: 0.0, w_d: 1.0, termination: Termination::Never };
        assert!(matches!(cfg.build(), Err(EnvError::InvalidReward { .. })));
    }

    #[test]
    fn closures_are_reward_functions() {
        let flat = |_: &Action, _: &[State], _: &[f64]| (1.0, false);
        assert_eq!(flat.evaluate(&Action::new(0.0, 0.0), &[], &[]), (1.0, false));
    }
}
