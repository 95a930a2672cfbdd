//! Drug-free equilibria of the two-species competition model.

use crate::error::DynamicsError;
use crate::types::OdeParams;

/// Local behaviour of the drug-free system around an equilibrium, read off
/// the trace and determinant of its 2x2 Jacobian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stability {
    StableNode,
    StableFocus,
    UnstableNode,
    UnstableFocus,
    Saddle,
    Center,
    /// Zero determinant: at least one eigenvalue vanishes.
    Degenerate,
}

impl Stability {
    #[must_use]
    pub fn is_stable(self) -> bool {
        matches!(self, Self::StableNode | Self::StableFocus)
    }

    #[must_use]
    pub fn classify(trace: f64, det: f64) -> Self {
        if det == 0.0 {
            Self::Degenerate
        } else if det < 0.0 {
            Self::Saddle
        } else if trace == 0.0 {
            Self::Center
        } else {
            let focus = trace * trace < 4.0 * det;
            match (trace < 0.0, focus) {
                (true, false) => Self::StableNode,
                (true, true) => Self::StableFocus,
                (false, false) => Self::UnstableNode,
                (false, true) => Self::UnstableFocus,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equilibrium {
    pub e: f64,
    pub z: f64,
}

impl Equilibrium {
    /// Jacobian of the drug-free two-species system at this point.
    #[must_use]
    pub fn jacobian(&self, p: &OdeParams) -> [[f64; 2]; 2] {
        let (e, z) = (self.e, self.z);
        [
            [p.r_e - 2.0 * p.r_e / p.c_e * e + p.alpha_ez * z, p.alpha_ez * e],
            [p.alpha_ze * z, p.r_z - 2.0 * p.r_z / p.c_z * z + p.alpha_ze * e],
        ]
    }

    #[must_use]
    pub fn stability(&self, p: &OdeParams) -> Stability {
        let j = self.jacobian(p);
        let trace = j[0][0] + j[1][1];
        let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
        Stability::classify(trace, det)
    }
}

/// Closed-form coexistence equilibrium of the drug-free system.
///
/// ```text
/// E* = cE (rE rZ + cZ rZ alpha_EZ) / (rE rZ - cE cZ alpha_EZ alpha_ZE)
/// Z* = cZ (rE rZ + cE rE alpha_ZE) / (rE rZ - cE cZ alpha_EZ alpha_ZE)
/// ```
///
/// # Errors
///
/// [`DynamicsError::EquilibriumDoesNotExist`] when the denominator vanishes
/// or either coordinate is not strictly positive.
pub fn coexist_equilibrium(p: &OdeParams) -> Result<Equilibrium, DynamicsError> {
    let denom = p.r_e * p.r_z - p.c_e * p.c_z * p.alpha_ez * p.alpha_ze;
    let e = p.c_e * (p.r_e * p.r_z + p.c_z * p.r_z * p.alpha_ez) / denom;
    let z = p.c_z * (p.r_e * p.r_z + p.c_e * p.r_e * p.alpha_ze) / denom;
    if denom == 0.0 || !e.is_finite() || !z.is_finite() || e <= 0.0 || z <= 0.0 {
        return Err(DynamicsError::EquilibriumDoesNotExist { e, z });
    }
    Ok(Equilibrium { e, z })
}

/// Each species alone at its carrying capacity.
#[must_use]
pub fn mono_equilibria(p: &OdeParams) -> Equilibrium {
    Equilibrium { e: p.c_e, z: p.c_z }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoCulture, System};
    use approx::assert_relative_eq;

    fn params(alpha_ez: f64, alpha_ze: f64) -> OdeParams {
        OdeParams {
            r_e: 0.5,
            r_z: 0.4,
            c_e: 1.0,
            c_z: 1.2,
            alpha_ez,
            alpha_ze,
            kd: 0.1,
            ki: 0.2,
            mic_e: 1.0,
            mic_z: 1.0,
            dmax_e: 1.0,
            dmax_z: 1.0,
            gamma: 2.0,
        }
    }

    #[test]
    fn coexistence_zeroes_growth() {
        let p = params(-0.1, -0.05);
        let eq = coexist_equilibrium(&p).unwrap();
        let f = CoCulture::new(&p, 0.0).rhs(&[eq.e, eq.z, 0.0]);
        assert_relative_eq!(f[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(f[1], 0.0, epsilon = 1e-12);
        assert!(eq.e < p.c_e && eq.z < p.c_z);
    }

    #[test]
    fn no_interaction_gives_carrying_capacities() {
        let p = params(0.0, 0.0);
        let eq = coexist_equilibrium(&p).unwrap();
        assert_relative_eq!(eq.e, 1.0, epsilon = 1e-12);
        assert_relative_eq!(eq.z, 1.2, epsilon = 1e-12);
        assert_eq!(mono_equilibria(&p), eq);
    }

    #[test]
    fn strong_suppression_has_no_coexistence() {
        let p = params(-1.0, 0.0);
        assert!(matches!(
            coexist_equilibrium(&p),
            Err(DynamicsError::EquilibriumDoesNotExist { .. })
        ));
    }

    #[test]
    fn vanishing_denominator_is_an_error() {
        // rE rZ == cE cZ alpha_EZ alpha_ZE, exactly representable
        let mut p = params(0.5, 0.5);
        p.r_z = 0.5;
        p.c_z = 1.0;
        assert!(coexist_equilibrium(&p).is_err());
    }

    #[test]
    fn weak_competition_is_stable() {
        let p = params(-0.1, -0.05);
        let eq = coexist_equilibrium(&p).unwrap();
        assert!(eq.stability(&p).is_stable());
    }

    #[test]
    fn classification_table() {
        assert_eq!(Stability::classify(-3.0, 2.0), Stability::StableNode);
        assert_eq!(Stability::classify(-1.0, 2.0), Stability::StableFocus);
        assert_eq!(Stability::classify(3.0, 2.0), Stability::UnstableNode);
        assert_eq!(Stability::classify(1.0, 2.0), Stability::UnstableFocus);
        assert_eq!(Stability::classify(1.0, -2.0), Stability::Saddle);
        assert_eq!(Stability::classify(0.0, 2.0), Stability::Center);
        assert_eq!(Stability::classify(1.0, 0.0), Stability::Degenerate);
    }
}
