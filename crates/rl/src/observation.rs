//! Controller-visible state derived from the continuous trajectory.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Densities within `max(EDGE_TOL_ABS, EDGE_TOL_REL * width)` of a bin edge
/// are treated as lying on it, so floating-point noise cannot flip a density
/// between neighbouring bins.
const EDGE_TOL_ABS: f64 = 1e-8;
const EDGE_TOL_REL: f64 = 1e-6;

/// How the environment turns its latest densities into an observation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method")]
pub enum StateMethod {
    /// Raw latest focal density.
    #[serde(rename = "cont_E")]
    ContinuousE,
    /// Focal density binned into `n_states` indices.
    #[serde(rename = "disc_E")]
    DiscreteE {
        n_states: usize,
        /// Upper end of the evenly partitioned range; defaults to the
        /// starting focal density of the episode.
        #[serde(default)]
        density_max: Option<f64>,
    },
    /// Both densities binned on a `sqrt(n_states)` square grid.
    #[serde(rename = "disc_EZ")]
    DiscreteEz {
        n_states: usize,
        #[serde(default)]
        density_max_e: Option<f64>,
        #[serde(default)]
        density_max_z: Option<f64>,
    },
}

impl StateMethod {
    #[must_use]
    pub fn n_states(&self) -> Option<usize> {
        match self {
            Self::ContinuousE => None,
            Self::DiscreteE { n_states, .. } | Self::DiscreteEz { n_states, .. } => Some(*n_states),
        }
    }

    /// # Errors
    ///
    /// [`EnvError::InvalidStateCount`] when the 1-D scheme has fewer than 3
    /// states or the 2-D scheme is not a perfect square of a side >= 3.
    pub fn validate(&self) -> Result<(), EnvError> {
        match self {
            Self::ContinuousE => Ok(()),
            Self::DiscreteE { n_states, density_max } => {
                if *n_states < 3 {
                    return Err(EnvError::InvalidStateCount { n_states: *n_states, needed: "at least 3 states" });
                }
                check_range(*density_max)
            }
            Self::DiscreteEz { n_states, density_max_e, density_max_z } => {
                match exact_sqrt(*n_states) {
                    Some(side) if side >= 3 => {}
                    Some(_) => {
                        return Err(EnvError::InvalidStateCount {
                            n_states: *n_states,
                            needed: "a grid side of at least 3",
                        })
                    }
                    None => {
                        return Err(EnvError::InvalidStateCount { n_states: *n_states, needed: "a perfect square" })
                    }
                }
                check_range(*density_max_e)?;
                check_range(*density_max_z)
            }
        }
    }
}

fn check_range(range: Option<f64>) -> Result<(), EnvError> {
    match range {
        Some(r) if !(r.is_finite() && r > 0.0) => Err(EnvError::InvalidDensityRange(r)),
        _ => Ok(()),
    }
}

fn exact_sqrt(n: usize) -> Option<usize> {
    let root = (n as f64).sqrt().round() as usize;
    (root * root == n).then_some(root)
}

/// What a controller sees after each step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    Continuous(f64),
    Discrete {
        /// Row of the value table.
        index: usize,
        /// Bin of the focal density alone; 0 means no focal density left.
        focal_bin: usize,
    },
}

impl Observation {
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Continuous(_) => None,
            Self::Discrete { index, .. } => Some(*index),
        }
    }

    /// Whether any focal density remains.
    #[must_use]
    pub fn focal_present(&self) -> bool {
        match self {
            Self::Continuous(e) => *e > 0.0,
            Self::Discrete { focal_bin, .. } => *focal_bin > 0,
        }
    }
}

/// Bin 0 holds densities <= 0, bins `1..=n_bins-2` split `(0, range)`
/// evenly and bin `n_bins-1` takes everything at or above `range`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Binning {
    n_bins: usize,
    width: f64,
}

impl Binning {
    #[must_use]
    pub fn new(n_bins: usize, range: f64) -> Self {
        debug_assert!(n_bins >= 3);
        Self { n_bins, width: range / (n_bins - 2) as f64 }
    }

    /// Density covered by one interior bin.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn bin(&self, density: f64) -> usize {
        if density <= 0.0 || density.is_nan() {
            return 0;
        }
        let ratio = density / self.width;
        let nearest = ratio.round();
        let tol = EDGE_TOL_ABS.max(EDGE_TOL_REL * self.width);
        let ratio = if (density - nearest * self.width).abs() <= tol { nearest } else { ratio };
        let interior = ratio.floor().min((self.n_bins - 2) as f64) as usize;
        interior + 1
    }
}

/// The scale derived for the active discrete method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Discretizer {
    Focal(Binning),
    Grid { e: Binning, z: Binning, side: usize },
}

impl Discretizer {
    /// Builds the bins for `method`; ranges not fixed by the method come from
    /// `(default_e, default_z)`.
    pub(crate) fn for_method(method: &StateMethod, default_e: f64, default_z: f64) -> Option<Self> {
        match method {
            StateMethod::ContinuousE => None,
            StateMethod::DiscreteE { n_states, density_max } => {
                Some(Self::Focal(Binning::new(*n_states, density_max.unwrap_or(default_e))))
            }
            StateMethod::DiscreteEz { n_states, density_max_e, density_max_z } => {
                let side = exact_sqrt(*n_states)?;
                Some(Self::Grid {
                    e: Binning::new(side, density_max_e.unwrap_or(default_e)),
                    z: Binning::new(side, density_max_z.unwrap_or(default_z)),
                    side,
                })
            }
        }
    }

    pub(crate) fn observe(&self, e: f64, z: f64) -> Observation {
        match self {
            Self::Focal(bins) => {
                let focal_bin = bins.bin(e);
                Observation::Discrete { index: focal_bin, focal_bin }
            }
            Self::Grid { e: e_bins, z: z_bins, side } => {
                let focal_bin = e_bins.bin(e);
                Observation::Discrete { index: focal_bin * side + z_bins.bin(z), focal_bin }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_zero_and_overflow_bins() {
        let bins = Binning::new(12, 1.0);
        assert_eq!(bins.bin(0.0), 0);
        assert_eq!(bins.bin(-0.3), 0);
        assert_eq!(bins.bin(1e-12), 1);
        assert_eq!(bins.bin(0.05), 1);
        assert_eq!(bins.bin(0.15), 2);
        assert_eq!(bins.bin(0.999), 10);
        assert_eq!(bins.bin(1.0), 11);
        assert_eq!(bins.bin(7.5), 11);
    }

    #[test]
    fn boundary_is_stable_under_tiny_perturbation() {
        let bins = Binning::new(12, 1.0);
        for k in 1..10 {
            let edge = k as f64 * bins.width();
            let at = bins.bin(edge);
            assert_eq!(bins.bin(edge + 1e-9), at, "edge {k}");
            assert_eq!(bins.bin(edge - 1e-9), at, "edge {k}");
            assert_eq!(at, k + 1);
        }
    }

    #[test]
    fn small_range_edges_are_stable() {
        let bins = Binning::new(12, 1e-3);
        for k in 1..10 {
            let edge = k as f64 * bins.width();
            assert_eq!(bins.bin(edge), k + 1, "edge {k}");
            assert_eq!(bins.bin(edge - 1e-9), k + 1, "edge {k}");
            assert_eq!(bins.bin(edge + 1e-9), k + 1, "edge {k}");
        }
        assert_eq!(bins.bin(0.5 * bins.width()), 1);
        assert_eq!(bins.bin(1.5 * bins.width()), 2);
    }

    #[test]
    fn grid_index_is_row_major_in_focal_bin() {
        let method = StateMethod::DiscreteEz { n_states: 16, density_max_e: Some(1.0), density_max_z: Some(2.0) };
        let disc = Discretizer::for_method(&method, 0.0, 0.0).unwrap();
        // side 4: widths 0.5 and 1.0
        assert_eq!(disc.observe(0.7, 0.2), Observation::Discrete { index: 2 * 4 + 1, focal_bin: 2 });
        assert_eq!(disc.observe(0.0, 5.0), Observation::Discrete { index: 3, focal_bin: 0 });
    }

    #[test]
    fn grid_requires_perfect_square() {
        let grid = |n_states| StateMethod::DiscreteEz { n_states, density_max_e: None, density_max_z: None };
        assert!(matches!(grid(15).validate(), Err(EnvError::InvalidStateCount { .. })));
        assert!(grid(16).validate().is_ok());
        assert!(grid(4).validate().is_err());
    }

    #[test]
    fn fixed_range_must_be_positive() {
        let m = StateMethod::DiscreteE { n_states: 10, density_max: Some(0.0) };
        assert!(matches!(m.validate(), Err(EnvError::InvalidDensityRange(_))));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(serde_json::from_str::<StateMethod>(r#"{"method": "cont_Z"}"#).is_err());
        assert!(serde_json::from_str::<StateMethod>(r#"{"method": "disc_E"}"#).is_err());
    }

    #[test]
    fn parses_tagged_config() {
        let m: StateMethod = serde_json::from_str(r#"{"method": "disc_E", "n_states": 10}"#).unwrap();
        assert_eq!(m, StateMethod::DiscreteE { n_states: 10, density_max: None });
    }
}
