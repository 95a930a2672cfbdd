use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::observation::Observation;

/// One dosing decision: drug inflow concentration held for `duration`
/// at the start of a decision interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Action {
    pub din: f64,
    pub duration: f64,
}

impl Action {
    #[must_use]
    pub const fn new(din: f64, duration: f64) -> Self {
        Self { din, duration }
    }
}

/// Starting densities used by [`Env::reset`]. The drug always restarts at
/// its configured initial concentration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetKind {
    /// Drug-free coexistence equilibrium.
    #[default]
    Coexist,
    /// Each species at its own carrying capacity.
    Mono,
    /// The configured initial conditions.
    Initial,
}

/// Result of a single [`Env::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
}

/// Episodic control environment.
///
/// Modelled on the Gym interface: [`step`] applies one action over a fixed
/// decision interval and returns the new observation, the reward and whether
/// a terminal condition was reached.
///
/// [`step`]: Env::step
pub trait Env {
    /// Restart the episode and return the initial observation.
    ///
    /// # Errors
    ///
    /// Fails when the requested starting point does not exist.
    fn reset(&mut self, kind: ResetKind) -> Result<Observation, EnvError>;

    /// Advance the environment by one decision interval.
    ///
    /// # Errors
    ///
    /// Fails on an invalid action or an integration failure.
    fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError>;

    /// Simulated time elapsed since the last reset.
    fn elapsed(&self) -> f64;

    /// First time the focal species fell to 5% of its starting density.
    fn first_five_percent(&self) -> Option<f64>;

    /// First time the focal species fell to the extinction threshold.
    fn first_tiny(&self) -> Option<f64>;

    /// Drug delivered since the last reset.
    fn total_drug_in(&self) -> f64;
}
