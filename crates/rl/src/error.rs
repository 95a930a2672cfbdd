use std::io;

use dynamics::DynamicsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error(transparent)]
    Dynamics(#[from] DynamicsError),
    #[error("drug duration {duration} exceeds the step budget {budget}")]
    InvalidAction { duration: f64, budget: f64 },
    #[error("drug inflow must be finite and >= 0, got {0}")]
    InvalidDose(f64),
    #[error("step time must be finite and > 0, got {0}")]
    InvalidStepTime(f64),
    #[error("state method requires {needed}, got n_states = {n_states}")]
    InvalidStateCount { n_states: usize, needed: &'static str },
    #[error("discretisation range must be finite and > 0, got {0}")]
    InvalidDensityRange(f64),
    #[error("reward parameter `{name}`: {reason}")]
    InvalidReward { name: &'static str, reason: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("{n_actions} actions configured but {n_options} dose options given")]
    ActionCountMismatch { n_actions: usize, n_options: usize },
    #[error("state {state} outside the value table ({n_states} states)")]
    StateOutOfRange { state: usize, n_states: usize },
    #[error("action {action} outside the value table ({n_actions} actions)")]
    ActionOutOfRange { action: usize, n_actions: usize },
    #[error("tabular agent needs a discretised observation")]
    ContinuousObservation,
    #[error("invalid rate parameter `{name}` = {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("value table needs {expected} entries, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum QTableError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("not a value table file (bad magic)")]
    BadMagic,
    #[error(transparent)]
    Shape(#[from] AgentError),
}

/// Umbrella error for the training and evaluation loop.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    QTable(#[from] QTableError),
    #[error("report sink failed: {0}")]
    Report(#[from] io::Error),
}
