use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynamicsError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
    #[error("coexistence equilibrium does not exist (E* = {e}, Z* = {z})")]
    EquilibriumDoesNotExist { e: f64, z: f64 },
    #[error("invalid integration interval [{t0}, {t1}]")]
    InvalidInterval { t0: f64, t1: f64 },
    #[error("step size underflow at t = {t} (h = {h})")]
    StepSizeUnderflow { t: f64, h: f64 },
    #[error("integration exceeded {limit} steps before reaching t = {t_end}")]
    StepLimitExceeded { limit: usize, t_end: f64 },
    #[error("non-finite state encountered at t = {t}")]
    NonFinite { t: f64 },
}
