#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp,
    clippy::many_single_char_names,
    clippy::needless_range_loop
)]
//! # Co-culture Dynamics
//!
//! Continuous-time model of a focal species `E` and a competitor `Z` under
//! antibiotic dosing, together with the numerical machinery needed to drive
//! it from a controller.
//!
//! ## Key Components
//!
//! -   **Parameters:** [`EnvParams`] bundles the growth, interaction and
//!     pharmacodynamic constants ([`OdeParams`]) with the initial densities
//!     ([`InitialConditions`]). Both deserialize from the JSON key names used
//!     by experiment parameter files.
//! -   **Model:** [`CoCulture`] implements [`System`], the right-hand side and
//!     analytic Jacobian of the three-state ODE under a constant drug inflow.
//! -   **Integration:** [`Integrator`] advances a [`System`] over an interval
//!     with a bounded internal step, switching between an explicit and an
//!     implicit pair, and records [`ThresholdEvent`] crossing times.
//! -   **Equilibria:** [`coexist_equilibrium`] solves the drug-free
//!     coexistence point in closed form; [`Equilibrium::stability`]
//!     classifies it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dynamics::{CoCulture, Integrator, SolverOptions, ThresholdEvent};
//!
//! let integrator = Integrator::new(SolverOptions::default())?;
//! let system = CoCulture::new(&params.ode_params, 100.0);
//! let segment = integrator.integrate(
//!     &system,
//!     params.initial_state(),
//!     0.0,
//!     180.0,
//!     &[ThresholdEvent::on_focal(1e-4)],
//! )?;
//! ```

pub mod equilibrium;
pub mod error;
pub mod integrator;
pub mod model;
pub mod types;

pub use equilibrium::{coexist_equilibrium, mono_equilibria, Equilibrium, Stability};
pub use error::DynamicsError;
pub use integrator::{snap_to_zero, Integrator, Segment, SolverMethod, SolverOptions, SolverStats, MAX_STEP_BOUND};
pub use model::{hill_kill, CoCulture, System};
pub use types::{EnvParams, InitialConditions, OdeParams, State, ThresholdEvent};
