//! # Bacterial Environment
//!
//! A co-culture of a focal species and a competitor under antibiotic
//! control. Every [`BacterialEnv::step`] covers one fixed decision interval:
//! the chosen inflow is applied for the action's duration and switched off
//! for the remainder, after which the trajectory, the threshold crossings
//! and the observation are updated and the reward is evaluated.

use dynamics::{
    coexist_equilibrium, mono_equilibria, CoCulture, EnvParams, Equilibrium, Integrator, Segment, SolverOptions,
    State, ThresholdEvent,
};
use tracing::{debug, warn};

use crate::env::{Action, Env, ResetKind, StepOutcome};
use crate::error::EnvError;
use crate::observation::{Discretizer, Observation, StateMethod};
use crate::reward::RewardFn;

/// Focal density treated as extinction.
pub const TINY_DENSITY: f64 = 1e-4;

/// Fraction of the starting focal density monitored as the "5%" event.
pub const FIVE_PERCENT: f64 = 0.05;

/// A dose as logged by the environment: inflow `din` switched on at `t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppliedAction {
    pub t: f64,
    pub din: f64,
}

/// Trajectory and bookkeeping of the current episode.
///
/// Only [`BacterialEnv::step`] and [`BacterialEnv::reset`] change it;
/// consumers get slices.
#[derive(Clone, Debug, Default)]
pub struct History {
    t: Vec<f64>,
    y: Vec<State>,
    actions: Vec<AppliedAction>,
    t_five_percent: Vec<f64>,
    t_tiny: Vec<f64>,
    total_drug_in: f64,
}

impl History {
    fn start(initial: State) -> Self {
        Self { t: vec![0.0], y: vec![initial], ..Self::default() }
    }

    fn extend(&mut self, segment: Segment) {
        let Segment { t, y, events, .. } = segment;
        self.t.extend(t);
        self.y.extend(y);
        let mut events = events.into_iter();
        if let Some(five) = events.next() {
            self.t_five_percent.extend(five);
        }
        if let Some(tiny) = events.next() {
            self.t_tiny.extend(tiny);
        }
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.t
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.y
    }

    #[must_use]
    pub fn actions(&self) -> &[AppliedAction] {
        &self.actions
    }

    /// Every crossing of the 5% threshold, in time order.
    #[must_use]
    pub fn five_percent_crossings(&self) -> &[f64] {
        &self.t_five_percent
    }

    /// Every crossing of [`TINY_DENSITY`], in time order.
    #[must_use]
    pub fn tiny_crossings(&self) -> &[f64] {
        &self.t_tiny
    }

    #[must_use]
    pub fn total_drug_in(&self) -> f64 {
        self.total_drug_in
    }

    /// Latest sample; the history always holds at least the starting point.
    #[must_use]
    pub fn last(&self) -> (f64, State) {
        (self.t.last().copied().unwrap_or(0.0), self.y.last().copied().unwrap_or_default())
    }
}

pub struct BacterialEnv {
    params: EnvParams,
    step_time: f64,
    integrator: Integrator,
    reward: Box<dyn RewardFn>,
    state_method: StateMethod,
    discretizer: Option<Discretizer>,
    history: History,
    initial: State,
    five_percent: f64,
    mono: bool,
    observation: Observation,
}

impl BacterialEnv {
    /// Creates an environment at the configured initial conditions.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters, a non-positive step time or an invalid
    /// state method.
    pub fn new(
        params: EnvParams,
        step_time: f64,
        reward: Box<dyn RewardFn>,
        state_method: StateMethod,
    ) -> Result<Self, EnvError> {
        params.validate()?;
        if !(step_time.is_finite() && step_time > 0.0) {
            return Err(EnvError::InvalidStepTime(step_time));
        }
        state_method.validate()?;
        let initial = params.initial_state();
        let mut env = Self {
            mono: initial.z == 0.0,
            five_percent: FIVE_PERCENT * initial.e,
            history: History::start(initial),
            initial,
            params,
            step_time,
            integrator: Integrator::default(),
            reward,
            state_method,
            discretizer: None,
            observation: Observation::Continuous(initial.e),
        };
        env.rescale();
        Ok(env)
    }

    /// Replaces the default solver settings.
    ///
    /// # Errors
    ///
    /// Propagates [`SolverOptions::validate`].
    pub fn with_solver(mut self, options: SolverOptions) -> Result<Self, EnvError> {
        self.integrator = Integrator::new(options)?;
        Ok(self)
    }

    /// Switches the observation scheme, rebuilding the discretisation scale
    /// and the current observation.
    ///
    /// # Errors
    ///
    /// Propagates [`StateMethod::validate`].
    pub fn set_state_method(&mut self, method: StateMethod) -> Result<(), EnvError> {
        method.validate()?;
        self.state_method = method;
        self.rescale();
        Ok(())
    }

    /// Drug-free coexistence point of this parameterisation.
    ///
    /// # Errors
    ///
    /// [`dynamics::DynamicsError::EquilibriumDoesNotExist`] when the species
    /// cannot coexist.
    pub fn coexist_equilibrium(&self) -> Result<Equilibrium, EnvError> {
        Ok(coexist_equilibrium(&self.params.ode_params)?)
    }

    #[must_use]
    pub fn params(&self) -> &EnvParams {
        &self.params
    }

    #[must_use]
    pub fn step_time(&self) -> f64 {
        self.step_time
    }

    #[must_use]
    pub fn state_method(&self) -> &StateMethod {
        &self.state_method
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn observation(&self) -> Observation {
        self.observation
    }

    /// Starting point of the current episode.
    #[must_use]
    pub fn initial_state(&self) -> State {
        self.initial
    }

    #[must_use]
    pub fn five_percent_threshold(&self) -> f64 {
        self.five_percent
    }

    /// Whether the episode started without a competitor.
    #[must_use]
    pub fn is_mono(&self) -> bool {
        self.mono
    }

    fn rescale(&mut self) {
        let c = &self.params.ode_params;
        let range_e = if self.initial.e > 0.0 { self.initial.e } else { c.c_e.abs() };
        let range_z = if self.initial.z > 0.0 { self.initial.z } else { c.c_z.abs() };
        self.discretizer = Discretizer::for_method(&self.state_method, range_e, range_z);
        self.observation = self.observe();
    }

    fn observe(&self) -> Observation {
        let (_, s) = self.history.last();
        match &self.discretizer {
            Some(d) => d.observe(s.e, s.z),
            None => Observation::Continuous(s.e),
        }
    }

    /// Integrates `duration` minutes under `din` from `(t0, y0)` without
    /// touching the history.
    fn advance(&self, din: f64, t0: f64, y0: State, duration: f64) -> Result<Segment, EnvError> {
        let events = [ThresholdEvent::on_focal(self.five_percent), ThresholdEvent::on_focal(TINY_DENSITY)];
        let system = CoCulture::new(&self.params.ode_params, din);
        let segment = self.integrator.integrate(&system, y0, t0, t0 + duration, &events)?;
        debug!(din, t0, duration, accepted = segment.stats.accepted, stiff = segment.stats.stiff_steps, "segment");
        Ok(segment)
    }
}

impl Env for BacterialEnv {
    fn reset(&mut self, kind: ResetKind) -> Result<Observation, EnvError> {
        let p = &self.params;
        let d0 = p.initial_conditions.d;
        let (initial, mono) = match kind {
            ResetKind::Coexist => {
                let eq = coexist_equilibrium(&p.ode_params)?;
                let stability = eq.stability(&p.ode_params);
                if !stability.is_stable() {
                    warn!(?stability, e = eq.e, z = eq.z, "resetting to a coexistence point that is not stable");
                }
                (State::new(eq.e, eq.z, d0), false)
            }
            ResetKind::Mono => {
                let eq = mono_equilibria(&p.ode_params);
                (State::new(eq.e, eq.z, d0), false)
            }
            ResetKind::Initial => {
                let s = p.initial_state();
                (s, s.z == 0.0)
            }
        };
        self.initial = initial;
        self.mono = mono;
        self.five_percent = FIVE_PERCENT * initial.e;
        self.history = History::start(initial);
        self.rescale();
        debug!(?kind, e = initial.e, z = initial.z, "reset");
        Ok(self.observation)
    }

    fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        if !(action.din.is_finite() && action.din >= 0.0) {
            return Err(EnvError::InvalidDose(action.din));
        }
        if !(action.duration >= 0.0 && action.duration <= self.step_time) {
            return Err(EnvError::InvalidAction { duration: action.duration, budget: self.step_time });
        }
        let (t_start, y_start) = self.history.last();
        let dosed = if action.duration > 0.0 {
            Some(self.advance(action.din, t_start, y_start, action.duration)?)
        } else {
            None
        };
        let remainder = self.step_time - action.duration;
        let washout = if remainder > 0.0 {
            let (t, y) = dosed.as_ref().and_then(Segment::last).unwrap_or((t_start, y_start));
            Some(self.advance(0.0, t, y, remainder)?)
        } else {
            None
        };

        // Both phases succeeded; only now does the step become visible.
        self.history.actions.push(AppliedAction { t: t_start, din: action.din });
        self.history.total_drug_in += action.din * action.duration * self.params.ode_params.ki;
        for segment in dosed.into_iter().chain(washout) {
            self.history.extend(segment);
        }

        self.observation = self.observe();
        let (reward, done) = self.reward.evaluate(&action, self.history.states(), self.history.times());
        debug!(t = self.elapsed(), reward, done, "step");
        Ok(StepOutcome { observation: self.observation, reward, done })
    }

    fn elapsed(&self) -> f64 {
        self.history.last().0
    }

    fn first_five_percent(&self) -> Option<f64> {
        self.history.t_five_percent.first().copied()
    }

    fn first_tiny(&self) -> Option<f64> {
        self.history.t_tiny.first().copied()
    }

    fn total_drug_in(&self) -> f64 {
        self.history.total_drug_in
    }
}
