#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
//! # Dosing Control
//!
//! Reinforcement-learning control of antibiotic dosing in a two-species
//! co-culture.
//!
//! ## Key Components
//!
//! -   **Environment:** [`BacterialEnv`] implements [`Env`]. Each step applies
//!     an [`Action`] over a fixed decision interval using the integrator from
//!     the `dynamics` crate and reports an [`Observation`], a reward from a
//!     [`RewardFn`] and a termination flag.
//! -   **Observations:** [`StateMethod`] selects the raw focal density or a
//!     1-D / 2-D binning whose index addresses the value table.
//! -   **Agents:** [`QLearningAgent`] (epsilon-greedy over a [`QTable`]) and
//!     the [`RationalAgent`] baseline, both behind [`Controller`] and
//!     resolved once into an [`Agent`].
//! -   **Loop:** [`run_episode`] and [`TrainTest`] coordinate resets, action
//!     selection, stepping, learning updates, checkpoints ([`CheckpointDir`])
//!     and per-episode reports ([`PerformanceSink`]).

pub mod agent;
pub mod bacterial_env;
pub mod env;
pub mod error;
pub mod observation;
pub mod qlearning;
pub mod qtable;
pub mod rational;
pub mod report;
pub mod reward;
pub mod train;

pub use agent::{Agent, Controller, Decision, FixedDose};
pub use bacterial_env::{AppliedAction, BacterialEnv, History, FIVE_PERCENT, TINY_DENSITY};
pub use env::{Action, Env, ResetKind, StepOutcome};
pub use error::{AgentError, EnvError, Error, QTableError};
pub use observation::{Binning, Observation, StateMethod};
pub use qlearning::{QLearningAgent, QLearningConfig, RateSchedule, Transition};
pub use qtable::{CheckpointDir, QTable, TieBreak};
pub use rational::RationalAgent;
pub use report::{write_testing_perf, write_trajectory, EpisodeRecord, PerformanceSink, TsvReport, NOT_REACHED};
pub use reward::{MinEd, RewardConfig, RewardFn, Termination};
pub use train::{run_episode, EpisodeSettings, EpisodeSummary, TrainTest, TrainingConfig};
