//! # Population and Drug Model
//!
//! Right-hand side of the two-species competition model with a Hill-type
//! kill term and first-order drug kinetics:
//!
//! ```text
//! dE/dt = E (rE - rE/cE E + alpha_EZ Z - deltaE(D))
//! dZ/dt = Z (rZ - rZ/cZ Z + alpha_ZE E - deltaZ(D))
//! dD/dt = ki Din - kd D
//! ```

use crate::types::OdeParams;

/// An autonomous three-dimensional vector field with an analytic Jacobian.
pub trait System {
    fn rhs(&self, y: &[f64; 3]) -> [f64; 3];

    /// `jac[i][j] = d rhs_i / d y_j`
    fn jacobian(&self, y: &[f64; 3]) -> [[f64; 3]; 3];
}

/// Hill kill rate `dmax D^gamma / (mic^gamma + D^gamma)`.
///
/// Negative concentrations (solver noise) are treated as zero.
#[must_use]
pub fn hill_kill(d: f64, mic: f64, dmax: f64, gamma: f64) -> f64 {
    let d = d.max(0.0);
    if d == 0.0 {
        return 0.0;
    }
    let dg = d.powf(gamma);
    dmax * dg / (mic.powf(gamma) + dg)
}

/// Derivative of [`hill_kill`] with respect to `d`.
#[must_use]
pub fn hill_kill_slope(d: f64, mic: f64, dmax: f64, gamma: f64) -> f64 {
    if d <= 0.0 {
        // the limit is finite and non-zero only for gamma == 1
        return if (gamma - 1.0).abs() < f64::EPSILON && mic != 0.0 { dmax / mic } else { 0.0 };
    }
    let mg = mic.powf(gamma);
    let dg = d.powf(gamma);
    let denom = mg + dg;
    dmax * gamma * mg * d.powf(gamma - 1.0) / (denom * denom)
}

/// The co-culture under a constant drug inflow concentration.
#[derive(Clone, Copy, Debug)]
pub struct CoCulture<'a> {
    pub params: &'a OdeParams,
    pub din: f64,
}

impl<'a> CoCulture<'a> {
    #[must_use]
    pub const fn new(params: &'a OdeParams, din: f64) -> Self {
        Self { params, din }
    }

    /// Kill rates `(deltaE, deltaZ)` at concentration `d`.
    #[must_use]
    pub fn kill_rates(&self, d: f64) -> (f64, f64) {
        let p = self.params;
        (
            hill_kill(d, p.mic_e, p.dmax_e, p.gamma),
            hill_kill(d, p.mic_z, p.dmax_z, p.gamma),
        )
    }
}

impl System for CoCulture<'_> {
    fn rhs(&self, y: &[f64; 3]) -> [f64; 3] {
        let p = self.params;
        let [e, z, d] = *y;
        let (delta_e, delta_z) = self.kill_rates(d);
        [
            e * (p.r_e - p.r_e / p.c_e * e + p.alpha_ez * z - delta_e),
            z * (p.r_z - p.r_z / p.c_z * z + p.alpha_ze * e - delta_z),
            p.ki * self.din - p.kd * d,
        ]
    }

    fn jacobian(&self, y: &[f64; 3]) -> [[f64; 3]; 3] {
        let p = self.params;
        let [e, z, d] = *y;
        let (delta_e, delta_z) = self.kill_rates(d);
        let slope_e = hill_kill_slope(d, p.mic_e, p.dmax_e, p.gamma);
        let slope_z = hill_kill_slope(d, p.mic_z, p.dmax_z, p.gamma);
        [
            [
                p.r_e - 2.0 * p.r_e / p.c_e * e + p.alpha_ez * z - delta_e,
                p.alpha_ez * e,
                -e * slope_e,
            ],
            [
                p.alpha_ze * z,
                p.r_z - 2.0 * p.r_z / p.c_z * z + p.alpha_ze * e - delta_z,
                -z * slope_z,
            ],
            [0.0, 0.0, -p.kd],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> OdeParams {
        OdeParams {
            r_e: 0.8,
            r_z: 0.6,
            c_e: 1.0,
            c_z: 1.5,
            alpha_ez: -0.2,
            alpha_ze: 0.1,
            kd: 0.3,
            ki: 0.5,
            mic_e: 1.0,
            mic_z: 2.0,
            dmax_e: 2.0,
            dmax_z: 1.0,
            gamma: 1.7,
        }
    }

    #[test]
    fn hill_is_half_max_at_mic() {
        assert_relative_eq!(hill_kill(2.0, 2.0, 3.0, 1.3), 1.5, epsilon = 1e-12);
        assert_eq!(hill_kill(0.0, 2.0, 3.0, 1.3), 0.0);
        assert_eq!(hill_kill(-1e-9, 2.0, 3.0, 1.3), 0.0);
    }

    #[test]
    fn drug_free_without_inflow_decays() {
        let p = params();
        let sys = CoCulture::new(&p, 0.0);
        let f = sys.rhs(&[0.0, 0.0, 2.0]);
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], 0.0);
        assert_relative_eq!(f[2], -0.6, epsilon = 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let p = params();
        let sys = CoCulture::new(&p, 1.2);
        let y = [0.4, 0.7, 0.9];
        let jac = sys.jacobian(&y);
        let h = 1e-6;
        for j in 0..3 {
            let mut up = y;
            let mut dn = y;
            up[j] += h;
            dn[j] -= h;
            let fu = sys.rhs(&up);
            let fd = sys.rhs(&dn);
            for i in 0..3 {
                let fd_ij = (fu[i] - fd[i]) / (2.0 * h);
                assert_relative_eq!(jac[i][j], fd_ij, epsilon = 1e-6);
            }
        }
    }
}
