//! # Numerical Integration
//!
//! Adaptive integration of a [`System`] over a fixed interval with threshold
//! event monitoring.
//!
//! Two embedded pairs are available and, in [`SolverMethod::Auto`], the
//! integrator switches between them step by step:
//!
//! -   **Dormand-Prince 5(4)** for non-stiff stretches (explicit, order 5).
//! -   **Rosenbrock 2(3)** (the L-stable pair of Shampine's `ode23s`) when
//!     `h * ||J||` leaves the explicit stability region.
//!
//! Every internal step is bounded by [`MAX_STEP_BOUND`]. Accepted steps are
//! returned as samples; events are located on a cubic Hermite interpolant
//! of the accepted step and recorded without stopping the integration.

use tracing::debug;

use crate::error::DynamicsError;
use crate::model::System;
use crate::types::{State, ThresholdEvent};

/// Upper bound on the internal step accepted by [`SolverOptions::validate`].
pub const MAX_STEP_BOUND: f64 = 0.01;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const STIFF_ENTER: f64 = 2.5;
const STIFF_LEAVE: f64 = 1.0;

/// Magnitude below which (after rounding to five decimals) a density sample
/// is reported as exactly zero.
const SNAP_SCALE: f64 = 1e5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolverMethod {
    /// Switch between the explicit and implicit pair based on a stiffness estimate.
    #[default]
    Auto,
    /// Dormand-Prince 5(4) only.
    Explicit,
    /// Rosenbrock 2(3) only.
    Implicit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverOptions {
    pub method: SolverMethod,
    pub rtol: f64,
    pub atol: f64,
    pub max_step: f64,
    /// Attempted steps allowed per call before giving up.
    pub max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: SolverMethod::Auto,
            rtol: 1e-3,
            atol: 1e-6,
            max_step: MAX_STEP_BOUND,
            max_steps: 50_000_000,
        }
    }
}

impl SolverOptions {
    /// # Errors
    ///
    /// Rejects non-positive tolerances and a `max_step` outside `(0, MAX_STEP_BOUND]`.
    pub fn validate(&self) -> Result<(), DynamicsError> {
        if !(self.max_step > 0.0 && self.max_step <= MAX_STEP_BOUND) {
            return Err(DynamicsError::InvalidParameter {
                name: "max_step",
                reason: "must lie in (0, 0.01]",
            });
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(DynamicsError::InvalidParameter {
                name: "tolerance",
                reason: "rtol and atol must be > 0",
            });
        }
        if self.max_steps == 0 {
            return Err(DynamicsError::InvalidParameter { name: "max_steps", reason: "must be > 0" });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub accepted: usize,
    pub rejected: usize,
    pub rhs_evals: usize,
    pub stiff_steps: usize,
}

/// Samples over `(t0, t1]` produced by one [`Integrator::integrate`] call.
#[derive(Clone, Debug, Default)]
pub struct Segment {
    pub t: Vec<f64>,
    pub y: Vec<State>,
    /// Crossing times, one list per detector in the order they were given.
    pub events: Vec<Vec<f64>>,
    pub stats: SolverStats,
}

impl Segment {
    #[must_use]
    pub fn last(&self) -> Option<(f64, State)> {
        Some((*self.t.last()?, *self.y.last()?))
    }
}

/// Rounds to five decimals and reports zero when the rounded value is zero.
#[inline]
#[must_use]
pub fn snap_to_zero(x: f64) -> f64 {
    if (x * SNAP_SCALE).round() == 0.0 {
        0.0
    } else {
        x
    }
}

struct Attempt {
    y: [f64; 3],
    f_new: [f64; 3],
    err: [f64; 3],
    order: i32,
}

#[derive(Clone, Debug, Default)]
pub struct Integrator {
    options: SolverOptions,
}

impl Integrator {
    /// # Errors
    ///
    /// Propagates [`SolverOptions::validate`].
    pub fn new(options: SolverOptions) -> Result<Self, DynamicsError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Integrates `system` from `y0` at `t0` up to `t1`.
    ///
    /// The initial point is not part of the output. Focal and competitor
    /// densities in the output are passed through [`snap_to_zero`]; the
    /// internal solution is left untouched.
    ///
    /// # Errors
    ///
    /// Fails on an inverted interval, a non-finite start state, step size
    /// underflow, or when the step budget is exhausted.
    pub fn integrate<S: System>(
        &self,
        system: &S,
        y0: State,
        t0: f64,
        t1: f64,
        events: &[ThresholdEvent],
    ) -> Result<Segment, DynamicsError> {
        if !(t0.is_finite() && t1.is_finite()) || t1 < t0 {
            return Err(DynamicsError::InvalidInterval { t0, t1 });
        }
        let mut out = Segment { events: vec![Vec::new(); events.len()], ..Segment::default() };
        if t1 == t0 {
            return Ok(out);
        }

        let opts = &self.options;
        let mut y = y0.to_array();
        if !y.iter().all(|v| v.is_finite()) {
            return Err(DynamicsError::NonFinite { t: t0 });
        }
        let mut f = system.rhs(&y);
        out.stats.rhs_evals += 1;

        let span = t1 - t0;
        let expected = (span / opts.max_step).ceil() as usize + 1;
        out.t.reserve(expected);
        out.y.reserve(expected);

        let mut t = t0;
        let mut h = opts.max_step.min(span);
        let mut stiff = opts.method == SolverMethod::Implicit;
        let mut g_prev: Vec<f64> = events.iter().map(|ev| ev.value(&y)).collect();
        let mut attempts = 0usize;

        while t < t1 {
            if attempts >= opts.max_steps {
                return Err(DynamicsError::StepLimitExceeded { limit: opts.max_steps, t_end: t1 });
            }
            attempts += 1;

            if opts.method == SolverMethod::Auto {
                let hr = h * inf_norm(&system.jacobian(&y));
                if !stiff && hr > STIFF_ENTER {
                    debug!(t, hr, "switching to implicit pair");
                    stiff = true;
                } else if stiff && hr < STIFF_LEAVE {
                    debug!(t, hr, "switching to explicit pair");
                    stiff = false;
                }
            }

            let remaining = t1 - t;
            let h_step = h.min(remaining);
            let attempt = if stiff {
                out.stats.rhs_evals += 2;
                rosenbrock_step(system, &y, &f, h_step)
            } else {
                out.stats.rhs_evals += 6;
                Some(dopri_step(system, &y, &f, h_step))
            };

            let Some(attempt) = attempt else {
                out.stats.rejected += 1;
                h = shrink(h_step, t)?;
                continue;
            };

            let err = error_norm(&attempt.err, &y, &attempt.y, opts.rtol, opts.atol);
            let finite = err.is_finite() && attempt.y.iter().all(|v| v.is_finite());
            if !finite || err > 1.0 {
                out.stats.rejected += 1;
                let factor = if finite {
                    (SAFETY * err.powf(-1.0 / f64::from(attempt.order + 1))).clamp(MIN_FACTOR, SAFETY)
                } else {
                    MIN_FACTOR
                };
                h = shrink_by(h_step, factor, t)?;
                continue;
            }

            let t_new = if remaining - h_step <= 4.0 * f64::EPSILON * t1.abs().max(1.0) {
                t1
            } else {
                t + h_step
            };

            for (k, ev) in events.iter().enumerate() {
                let g_new = ev.value(&attempt.y);
                if crosses(g_prev[k], g_new) {
                    let c = ev.component;
                    let theta = locate_root(
                        y[c] - ev.level,
                        f[c] * h_step,
                        attempt.y[c] - ev.level,
                        attempt.f_new[c] * h_step,
                    );
                    out.events[k].push(t + theta * (t_new - t));
                }
                g_prev[k] = g_new;
            }

            t = t_new;
            y = attempt.y;
            f = attempt.f_new;
            out.t.push(t);
            out.y.push(State::new(snap_to_zero(y[0]), snap_to_zero(y[1]), y[2]));
            out.stats.accepted += 1;
            if stiff {
                out.stats.stiff_steps += 1;
            }

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-1.0 / f64::from(attempt.order + 1))).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            h = (h_step * factor).min(opts.max_step);
        }

        debug!(
            t0,
            t1,
            accepted = out.stats.accepted,
            rejected = out.stats.rejected,
            stiff_steps = out.stats.stiff_steps,
            "integrated segment"
        );
        Ok(out)
    }
}

fn shrink(h: f64, t: f64) -> Result<f64, DynamicsError> {
    shrink_by(h, MIN_FACTOR, t)
}

fn shrink_by(h: f64, factor: f64, t: f64) -> Result<f64, DynamicsError> {
    let h_new = h * factor;
    if h_new < 16.0 * f64::EPSILON * t.abs().max(1.0) {
        return Err(DynamicsError::StepSizeUnderflow { t, h: h_new });
    }
    Ok(h_new)
}

fn crosses(g0: f64, g1: f64) -> bool {
    (g0 < 0.0 && g1 >= 0.0) || (g0 > 0.0 && g1 <= 0.0)
}

/// Root in `[0, 1]` of the cubic Hermite interpolant with end values
/// `g0`, `g1` and scaled end slopes `s0 = h f0`, `s1 = h f1`.
fn locate_root(g0: f64, s0: f64, g1: f64, s1: f64) -> f64 {
    if g1 == 0.0 {
        return 1.0;
    }
    let p = |th: f64| {
        let th2 = th * th;
        let th3 = th2 * th;
        (2.0 * th3 - 3.0 * th2 + 1.0) * g0
            + (th3 - 2.0 * th2 + th) * s0
            + (-2.0 * th3 + 3.0 * th2) * g1
            + (th3 - th2) * s1
    };
    // Illinois variant of regula falsi
    let (mut a, mut fa) = (0.0_f64, g0);
    let (mut b, mut fb) = (1.0_f64, g1);
    let mut side = 0i8;
    for _ in 0..100 {
        if (b - a).abs() < 1e-14 {
            break;
        }
        let c = (a * fb - b * fa) / (fb - fa);
        let fc = p(c);
        if fc == 0.0 {
            return c;
        }
        if fc.signum() == fb.signum() {
            b = c;
            fb = fc;
            if side == -1 {
                fa *= 0.5;
            }
            side = -1;
        } else {
            a = c;
            fa = fc;
            if side == 1 {
                fb *= 0.5;
            }
            side = 1;
        }
    }
    if fa.abs() < fb.abs() {
        a
    } else {
        b
    }
}

fn inf_norm(m: &[[f64; 3]; 3]) -> f64 {
    m.iter().map(|row| row.iter().map(|v| v.abs()).sum::<f64>()).fold(0.0, f64::max)
}

fn error_norm(err: &[f64; 3], y: &[f64; 3], y_new: &[f64; 3], rtol: f64, atol: f64) -> f64 {
    let sum: f64 = (0..3)
        .map(|i| {
            let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
            (err[i] / scale).powi(2)
        })
        .sum();
    (sum / 3.0).sqrt()
}

#[inline]
fn axpy(y: &[f64; 3], h: f64, terms: &[(f64, &[f64; 3])]) -> [f64; 3] {
    let mut out = *y;
    for (coef, k) in terms {
        for i in 0..3 {
            out[i] += h * coef * k[i];
        }
    }
    out
}

fn dopri_step<S: System>(system: &S, y: &[f64; 3], k1: &[f64; 3], h: f64) -> Attempt {
    let k2 = system.rhs(&axpy(y, h, &[(1.0 / 5.0, k1)]));
    let k3 = system.rhs(&axpy(y, h, &[(3.0 / 40.0, k1), (9.0 / 40.0, &k2)]));
    let k4 = system.rhs(&axpy(y, h, &[(44.0 / 45.0, k1), (-56.0 / 15.0, &k2), (32.0 / 9.0, &k3)]));
    let k5 = system.rhs(&axpy(
        y,
        h,
        &[
            (19372.0 / 6561.0, k1),
            (-25360.0 / 2187.0, &k2),
            (64448.0 / 6561.0, &k3),
            (-212.0 / 729.0, &k4),
        ],
    ));
    let k6 = system.rhs(&axpy(
        y,
        h,
        &[
            (9017.0 / 3168.0, k1),
            (-355.0 / 33.0, &k2),
            (46732.0 / 5247.0, &k3),
            (49.0 / 176.0, &k4),
            (-5103.0 / 18656.0, &k5),
        ],
    ));
    let y_new = axpy(
        y,
        h,
        &[
            (35.0 / 384.0, k1),
            (500.0 / 1113.0, &k3),
            (125.0 / 192.0, &k4),
            (-2187.0 / 6784.0, &k5),
            (11.0 / 84.0, &k6),
        ],
    );
    let k7 = system.rhs(&y_new);
    let err = axpy(
        &[0.0; 3],
        h,
        &[
            (71.0 / 57600.0, k1),
            (-71.0 / 16695.0, &k3),
            (71.0 / 1920.0, &k4),
            (-17253.0 / 339_200.0, &k5),
            (22.0 / 525.0, &k6),
            (-1.0 / 40.0, &k7),
        ],
    );
    Attempt { y: y_new, f_new: k7, err, order: 4 }
}

/// One step of the Rosenbrock 2(3) pair. `None` when the iteration matrix is singular.
fn rosenbrock_step<S: System>(system: &S, y: &[f64; 3], f0: &[f64; 3], h: f64) -> Option<Attempt> {
    let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
    let e32 = 6.0 + std::f64::consts::SQRT_2;

    let jac = system.jacobian(y);
    let mut w = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let identity = if i == j { 1.0 } else { 0.0 };
            w[i][j] = identity - h * d * jac[i][j];
        }
    }
    let lu = Lu3::factor(w)?;

    let k1 = lu.solve(*f0);
    let f1 = system.rhs(&axpy(y, h, &[(0.5, &k1)]));
    let mut k2 = lu.solve(sub(&f1, &k1));
    for i in 0..3 {
        k2[i] += k1[i];
    }
    let y_new = axpy(y, h, &[(1.0, &k2)]);
    let f2 = system.rhs(&y_new);
    let mut rhs3 = [0.0; 3];
    for i in 0..3 {
        rhs3[i] = f2[i] - e32 * (k2[i] - f1[i]) - 2.0 * (k1[i] - f0[i]);
    }
    let k3 = lu.solve(rhs3);
    let mut err = [0.0; 3];
    for i in 0..3 {
        err[i] = h / 6.0 * (k1[i] - 2.0 * k2[i] + k3[i]);
    }
    Some(Attempt { y: y_new, f_new: f2, err, order: 2 })
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// LU factorisation with partial pivoting of a 3x3 matrix.
struct Lu3 {
    lu: [[f64; 3]; 3],
    perm: [usize; 3],
}

impl Lu3 {
    fn factor(mut a: [[f64; 3]; 3]) -> Option<Self> {
        let mut perm = [0, 1, 2];
        for k in 0..3 {
            let pivot = (k..3).max_by(|&i, &j| a[i][k].abs().total_cmp(&a[j][k].abs()))?;
            if a[pivot][k].abs() < f64::MIN_POSITIVE {
                return None;
            }
            a.swap(k, pivot);
            perm.swap(k, pivot);
            for i in k + 1..3 {
                a[i][k] /= a[k][k];
                for j in k + 1..3 {
                    a[i][j] -= a[i][k] * a[k][j];
                }
            }
        }
        Some(Self { lu: a, perm })
    }

    fn solve(&self, b: [f64; 3]) -> [f64; 3] {
        let mut x = [b[self.perm[0]], b[self.perm[1]], b[self.perm[2]]];
        for i in 0..3 {
            for j in 0..i {
                x[i] -= self.lu[i][j] * x[j];
            }
        }
        for i in (0..3).rev() {
            for j in i + 1..3 {
                x[i] -= self.lu[i][j] * x[j];
            }
            x[i] /= self.lu[i][i];
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `y' = -k y` in every component.
    struct Decay(f64);

    impl System for Decay {
        fn rhs(&self, y: &[f64; 3]) -> [f64; 3] {
            [-self.0 * y[0], -self.0 * y[1], -self.0 * y[2]]
        }

        fn jacobian(&self, _y: &[f64; 3]) -> [[f64; 3]; 3] {
            [[-self.0, 0.0, 0.0], [0.0, -self.0, 0.0], [0.0, 0.0, -self.0]]
        }
    }

    fn run(method: SolverMethod, k: f64, t1: f64) -> Segment {
        let integrator = Integrator::new(SolverOptions { method, ..SolverOptions::default() }).unwrap();
        integrator
            .integrate(&Decay(k), State::new(1.0, 2.0, 3.0), 0.0, t1, &[ThresholdEvent::on_focal(0.5)])
            .unwrap()
    }

    #[test]
    fn explicit_pair_tracks_exponential_decay() {
        let seg = run(SolverMethod::Explicit, 1.0, 2.0);
        let (t, y) = seg.last().unwrap();
        assert_eq!(t, 2.0);
        assert_relative_eq!(y.e, (-2.0_f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(y.d, 3.0 * (-2.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn implicit_pair_tracks_exponential_decay() {
        let seg = run(SolverMethod::Implicit, 1.0, 2.0);
        let (_, y) = seg.last().unwrap();
        assert_relative_eq!(y.e, (-2.0_f64).exp(), epsilon = 5e-4);
        assert_eq!(seg.stats.stiff_steps, seg.stats.accepted);
    }

    #[test]
    fn auto_switches_to_implicit_when_stiff() {
        let seg = run(SolverMethod::Auto, 1000.0, 0.1);
        assert!(seg.stats.stiff_steps > 0);
        let (_, y) = seg.last().unwrap();
        assert!(y.e.abs() < 1e-4);
    }

    #[test]
    fn steps_never_exceed_bound_and_start_point_is_excluded() {
        let seg = run(SolverMethod::Auto, 0.1, 1.0);
        assert!(seg.t[0] > 0.0);
        let mut prev = 0.0;
        for &t in &seg.t {
            assert!(t - prev <= MAX_STEP_BOUND + 1e-12);
            assert!(t > prev);
            prev = t;
        }
    }

    #[test]
    fn event_time_located_on_interpolant() {
        let seg = run(SolverMethod::Explicit, 1.0, 2.0);
        assert_eq!(seg.events[0].len(), 1);
        assert_relative_eq!(seg.events[0][0], 2.0_f64.ln(), epsilon = 1e-7);
    }

    #[test]
    fn rejects_loose_step_bound() {
        let opts = SolverOptions { max_step: 0.1, ..SolverOptions::default() };
        assert!(Integrator::new(opts).is_err());
    }

    #[test]
    fn empty_interval_yields_no_samples() {
        let integrator = Integrator::default();
        let seg = integrator.integrate(&Decay(1.0), State::new(1.0, 1.0, 1.0), 3.0, 3.0, &[]).unwrap();
        assert!(seg.t.is_empty());
        assert!(integrator.integrate(&Decay(1.0), State::default(), 3.0, 2.0, &[]).is_err());
    }

    /// Vector field that evaluates to NaN everywhere.
    struct Poisoned;

    impl System for Poisoned {
        fn rhs(&self, _y: &[f64; 3]) -> [f64; 3] {
            [f64::NAN; 3]
        }

        fn jacobian(&self, _y: &[f64; 3]) -> [[f64; 3]; 3] {
            [[0.0; 3]; 3]
        }
    }

    #[test]
    fn exhausted_step_budget_is_an_error() {
        let integrator = Integrator::new(SolverOptions { max_steps: 10, ..SolverOptions::default() }).unwrap();
        let err = integrator.integrate(&Decay(0.1), State::new(1.0, 1.0, 1.0), 0.0, 1.0, &[]).unwrap_err();
        assert_eq!(err, DynamicsError::StepLimitExceeded { limit: 10, t_end: 1.0 });
    }

    #[test]
    fn non_finite_start_state_is_an_error() {
        let integrator = Integrator::default();
        let err = integrator.integrate(&Decay(0.1), State::new(f64::NAN, 1.0, 1.0), 2.0, 3.0, &[]).unwrap_err();
        assert_eq!(err, DynamicsError::NonFinite { t: 2.0 });
    }

    #[test]
    fn non_finite_field_underflows_step_size() {
        let integrator = Integrator::new(SolverOptions { method: SolverMethod::Explicit, ..SolverOptions::default() })
            .unwrap();
        let err = integrator.integrate(&Poisoned, State::new(1.0, 1.0, 1.0), 0.0, 1.0, &[]).unwrap_err();
        assert!(matches!(err, DynamicsError::StepSizeUnderflow { t, .. } if t == 0.0));
    }

    #[test]
    fn snapping_only_near_zero() {
        assert_eq!(snap_to_zero(-3e-6), 0.0);
        assert_eq!(snap_to_zero(4e-6), 0.0);
        assert_eq!(snap_to_zero(2e-5), 2e-5);
        assert_eq!(snap_to_zero(-2e-5), -2e-5);
    }
}
