#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # POLIN
//!
//! Experiments on antibiotic dosing control of a two-species co-culture.
//!
//! ## Crates
//!
//! -   **[`dynamics`]:** the population and drug model, the stiffness-aware
//!     integrator with threshold events and the equilibrium solver.
//! -   **[`rl`]:** the bacterial environment, the Q-learning and baseline
//!     controllers and the training/evaluation loop.
//! -   **`polin`:** this crate. It reads experiment parameter files
//!     ([`config`]), runs them ([`app`]) and is the entry point of the
//!     `polin` binary.
//!
//! ## Getting Started
//!
//! ```text
//! polin run -f exp.json               # train, then evaluate the last checkpoint
//! polin run -f exp.json --test-only --test-qtable-episode 120
//! polin simulate -f exp.json --din 100 --drug-time 180 --horizon 2100
//! ```
//!
//! Logging goes through `tracing`; set `RUST_LOG=debug` to see every
//! integration segment and environment step.

pub mod app;
pub mod config;

pub use dynamics;
pub use rl;
