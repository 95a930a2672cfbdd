use serde::{Deserialize, Serialize};

use crate::error::DynamicsError;

/// Densities of the two species and the drug concentration at one instant.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct State {
    /// Focal species density.
    pub e: f64,
    /// Competitor species density.
    pub z: f64,
    /// Drug concentration.
    pub d: f64,
}

impl State {
    #[must_use]
    pub const fn new(e: f64, z: f64, d: f64) -> Self {
        Self { e, z, d }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.e, self.z, self.d]
    }

    #[must_use]
    pub const fn from_array(y: [f64; 3]) -> Self {
        Self { e: y[0], z: y[1], d: y[2] }
    }

    /// Combined density of both species.
    #[must_use]
    pub fn total_density(&self) -> f64 {
        self.e + self.z
    }
}

/// Growth, interaction and pharmacodynamic parameters of the model.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct OdeParams {
    #[serde(rename = "rE")]
    pub r_e: f64,
    #[serde(rename = "rZ")]
    pub r_z: f64,
    #[serde(rename = "cE")]
    pub c_e: f64,
    #[serde(rename = "cZ")]
    pub c_z: f64,
    #[serde(rename = "alpha_EZ")]
    pub alpha_ez: f64,
    #[serde(rename = "alpha_ZE")]
    pub alpha_ze: f64,
    /// Drug decay rate.
    pub kd: f64,
    /// Drug influx rate.
    pub ki: f64,
    #[serde(rename = "micE")]
    pub mic_e: f64,
    #[serde(rename = "micZ")]
    pub mic_z: f64,
    #[serde(rename = "dmaxE")]
    pub dmax_e: f64,
    #[serde(rename = "dmaxZ")]
    pub dmax_z: f64,
    /// Hill exponent shared by both kill curves.
    pub gamma: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct InitialConditions {
    #[serde(rename = "E")]
    pub e: f64,
    #[serde(rename = "Z")]
    pub z: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl From<InitialConditions> for State {
    fn from(ic: InitialConditions) -> Self {
        State::new(ic.e, ic.z, ic.d)
    }
}

/// Immutable per-episode configuration of a bacterial environment.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EnvParams {
    pub ode_params: OdeParams,
    pub initial_conditions: InitialConditions,
}

impl EnvParams {
    /// Checks that every rate and capacity is finite and that the Hill
    /// exponent is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicsError::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<(), DynamicsError> {
        let p = &self.ode_params;
        let ic = &self.initial_conditions;
        let fields = [
            ("rE", p.r_e),
            ("rZ", p.r_z),
            ("cE", p.c_e),
            ("cZ", p.c_z),
            ("alpha_EZ", p.alpha_ez),
            ("alpha_ZE", p.alpha_ze),
            ("kd", p.kd),
            ("ki", p.ki),
            ("micE", p.mic_e),
            ("micZ", p.mic_z),
            ("dmaxE", p.dmax_e),
            ("dmaxZ", p.dmax_z),
            ("gamma", p.gamma),
            ("E", ic.e),
            ("Z", ic.z),
            ("D", ic.d),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(DynamicsError::InvalidParameter { name, reason: "must be finite" });
            }
        }
        if p.gamma <= 0.0 {
            return Err(DynamicsError::InvalidParameter { name: "gamma", reason: "must be > 0" });
        }
        if p.c_e == 0.0 || p.c_z == 0.0 {
            return Err(DynamicsError::InvalidParameter {
                name: if p.c_e == 0.0 { "cE" } else { "cZ" },
                reason: "carrying capacity must be non-zero",
            });
        }
        Ok(())
    }

    /// Initial state as configured, before any equilibrium reset.
    #[must_use]
    pub fn initial_state(&self) -> State {
        self.initial_conditions.into()
    }
}

/// Zero-crossing detector on one state component: `y[component] - level`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdEvent {
    pub component: usize,
    pub level: f64,
}

impl ThresholdEvent {
    #[must_use]
    pub const fn on_focal(level: f64) -> Self {
        Self { component: 0, level }
    }

    #[inline]
    #[must_use]
    pub fn value(&self, y: &[f64; 3]) -> f64 {
        y[self.component] - self.level
    }
}
