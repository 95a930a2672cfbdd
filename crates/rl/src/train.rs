//! # Training and Evaluation Loop
//!
//! [`run_episode`] drives one episode of any [`Env`] with any [`Controller`];
//! [`TrainTest`] repeats it over many episodes for Q-learning, scheduling the
//! exploration (and optionally the learning) rate, checkpointing the value
//! table and reporting per-episode metrics.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::Controller;
use crate::env::{Env, ResetKind};
use crate::error::Error;
use crate::qlearning::{QLearningAgent, RateSchedule, Transition};
use crate::qtable::CheckpointDir;
use crate::report::{EpisodeRecord, PerformanceSink};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeSettings {
    /// Stepping continues while elapsed time is below this.
    pub horizon: f64,
    pub explore_rate: f64,
    /// Apply learning updates after every step.
    pub training: bool,
    /// Leave the loop the first time a step reports `done`.
    pub stop_on_done: bool,
    pub reset: ResetKind,
}

/// Metrics of one finished episode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpisodeSummary {
    pub e_return: f64,
    pub first_five_percent: Option<f64>,
    pub first_tiny: Option<f64>,
    pub total_drug_in: f64,
    pub steps: usize,
    pub elapsed: f64,
    /// Whether any step reported `done`.
    pub terminated: bool,
}

/// Runs a single episode from reset to the horizon or early stop.
///
/// # Errors
///
/// Environment, agent or integration failures; nothing is retried.
pub fn run_episode<E, C>(env: &mut E, controller: &mut C, settings: &EpisodeSettings) -> Result<EpisodeSummary, Error>
where
    E: Env + ?Sized,
    C: Controller + ?Sized,
{
    let mut observation = env.reset(settings.reset)?;
    let mut summary = EpisodeSummary::default();
    let learn = settings.training && controller.is_learning();

    while env.elapsed() < settings.horizon {
        let decision = controller.decide(&observation, settings.explore_rate)?;
        let outcome = env.step(decision.action)?;
        if learn {
            if let (Some(action), Some(state), Some(next_state)) =
                (decision.action_index, observation.index(), outcome.observation.index())
            {
                let reward = outcome.reward;
                controller.learn(&Transition { state, action, reward, next_state, done: outcome.done })?;
            }
        }
        summary.e_return += outcome.reward;
        summary.steps += 1;
        observation = outcome.observation;
        if outcome.done {
            summary.terminated = true;
            if settings.stop_on_done {
                debug!(t = env.elapsed(), "early stop");
                break;
            }
        }
    }

    summary.first_five_percent = env.first_five_percent();
    summary.first_tiny = env.first_tiny();
    summary.total_drug_in = env.total_drug_in();
    summary.elapsed = env.elapsed();
    Ok(summary)
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TrainingConfig {
    pub n_episodes: usize,
    /// Exploration schedule; `decay` as in [`QLearningAgent::get_rate`].
    pub decay: f64,
    #[serde(default)]
    pub min_explore_rate: f64,
    #[serde(default = "max_rate")]
    pub max_explore_rate: f64,
    /// Per-episode learning-rate schedule; the configured `alpha` is used
    /// throughout when absent.
    #[serde(default)]
    pub learning_rate: Option<RateSchedule>,
    pub episode_time_max: f64,
    #[serde(default = "default_true")]
    pub stop_on_done: bool,
    #[serde(default)]
    pub reset: ResetKind,
}

fn max_rate() -> f64 {
    1.0
}

impl TrainingConfig {
    #[must_use]
    pub fn explore_schedule(&self) -> RateSchedule {
        RateSchedule { decay: self.decay, min_r: self.min_explore_rate, max_r: self.max_explore_rate }
    }
}

/// Repeated episodes against one environment.
pub struct TrainTest<E> {
    env: E,
    sim_time: f64,
    reset: ResetKind,
}

impl<E: Env> TrainTest<E> {
    /// `sim_time` is the horizon of evaluation episodes.
    #[must_use]
    pub fn new(env: E, sim_time: f64, reset: ResetKind) -> Self {
        Self { env, sim_time, reset }
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    /// One evaluation episode without learning updates.
    ///
    /// # Errors
    ///
    /// See [`run_episode`].
    pub fn test<C: Controller + ?Sized>(
        &mut self,
        controller: &mut C,
        explore_rate: f64,
        stop_on_done: bool,
    ) -> Result<EpisodeSummary, Error> {
        let settings = EpisodeSettings {
            horizon: self.sim_time,
            explore_rate,
            training: false,
            stop_on_done,
            reset: self.reset,
        };
        let summary = run_episode(&mut self.env, controller, &settings)?;
        info!(e_return = summary.e_return, steps = summary.steps, drug = summary.total_drug_in, "test episode");
        Ok(summary)
    }

    /// Trains `agent` for `config.n_episodes` episodes. The value table is
    /// kept across episodes and checkpointed after each one.
    ///
    /// # Errors
    ///
    /// Invalid schedules, episode failures, checkpoint or sink I/O.
    pub fn train(
        &mut self,
        agent: &mut QLearningAgent,
        config: &TrainingConfig,
        checkpoints: Option<&CheckpointDir>,
        sink: &mut dyn PerformanceSink,
    ) -> Result<(), Error> {
        let explore = config.explore_schedule();
        for episode in 0..config.n_episodes {
            let explore_rate = explore.rate(episode)?;
            if let Some(schedule) = &config.learning_rate {
                agent.set_alpha(schedule.rate(episode)?)?;
            }
            let settings = EpisodeSettings {
                horizon: config.episode_time_max,
                explore_rate,
                training: true,
                stop_on_done: config.stop_on_done,
                reset: config.reset,
            };
            let summary = run_episode(&mut self.env, agent, &settings)?;
            if let Some(dir) = checkpoints {
                dir.save(episode, agent.values())?;
            }
            sink.record(&EpisodeRecord { episode, explore_rate, summary })?;
            info!(
                episode,
                explore_rate,
                alpha = agent.alpha(),
                e_return = summary.e_return,
                steps = summary.steps,
                "training episode"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FixedDose;
    use crate::env::{Action, StepOutcome};
    use crate::error::EnvError;
    use crate::observation::Observation;

    /// Counts steps and reports `done` from step `done_at` on.
    struct Countdown {
        t: f64,
        done_at: usize,
        steps: usize,
    }

    impl Env for Countdown {
        fn reset(&mut self, _kind: ResetKind) -> Result<Observation, EnvError> {
            self.t = 0.0;
            self.steps = 0;
            Ok(Observation::Discrete { index: 0, focal_bin: 0 })
        }

        fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
            self.t += 10.0;
            self.steps += 1;
            Ok(StepOutcome {
                observation: Observation::Discrete { index: self.steps % 2, focal_bin: 1 },
                reward: action.din,
                done: self.steps >= self.done_at,
            })
        }

        fn elapsed(&self) -> f64 {
            self.t
        }

        fn first_five_percent(&self) -> Option<f64> {
            None
        }

        fn first_tiny(&self) -> Option<f64> {
            Some(5.0)
        }

        fn total_drug_in(&self) -> f64 {
            0.0
        }
    }

    fn settings(stop_on_done: bool) -> EpisodeSettings {
        EpisodeSettings { horizon: 100.0, explore_rate: 0.0, training: false, stop_on_done, reset: ResetKind::Coexist }
    }

    #[test]
    fn runs_to_horizon_without_early_stop() {
        let mut env = Countdown { t: 0.0, done_at: 3, steps: 0 };
        let s = run_episode(&mut env, &mut FixedDose(Action::new(1.0, 0.0)), &settings(false)).unwrap();
        assert_eq!(s.steps, 10);
        assert_eq!(s.e_return, 10.0);
        assert!(s.terminated);
        assert_eq!(s.first_tiny, Some(5.0));
        assert_eq!(s.first_five_percent, None);
    }

    #[test]
    fn stops_at_first_done() {
        let mut env = Countdown { t: 0.0, done_at: 3, steps: 0 };
        let s = run_episode(&mut env, &mut FixedDose(Action::new(1.0, 0.0)), &settings(true)).unwrap();
        assert_eq!(s.steps, 3);
        assert_eq!(s.elapsed, 30.0);
    }
}
