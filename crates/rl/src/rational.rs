use serde::{Deserialize, Serialize};

use crate::env::Action;

/// Baseline policy: dose `din` for `drug_time` whenever any focal density
/// is observed, otherwise dose nothing for the same duration.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct RationalAgent {
    #[serde(rename = "Din", default = "default_din")]
    pub din: f64,
    #[serde(default = "default_drug_time")]
    pub drug_time: f64,
}

fn default_din() -> f64 {
    100.0
}

fn default_drug_time() -> f64 {
    180.0
}

impl Default for RationalAgent {
    fn default() -> Self {
        Self { din: default_din(), drug_time: default_drug_time() }
    }
}

impl RationalAgent {
    #[must_use]
    pub const fn new(din: f64, drug_time: f64) -> Self {
        Self { din, drug_time }
    }

    /// Action for a continuous focal density.
    #[must_use]
    pub fn get_action(&self, density: f64) -> Action {
        if density > 0.0 {
            Action::new(self.din, self.drug_time)
        } else {
            Action::new(0.0, self.drug_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(RationalAgent::default(), RationalAgent::new(100.0, 180.0));
        let parsed: RationalAgent = serde_json::from_str(r#"{"Din": 50.0}"#).unwrap();
        assert_eq!(parsed, RationalAgent::new(50.0, 180.0));
    }

    #[test]
    fn nan_density_is_not_positive() {
        assert_eq!(RationalAgent::default().get_action(f64::NAN), Action::new(0.0, 180.0));
    }
}
