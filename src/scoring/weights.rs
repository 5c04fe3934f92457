//! Component weights for the total score.
//!
//! JSON / TOML shape:
//! {
//!   "money": 0.33,
//!   "passion": 0.34,
//!   "location": 0.33
//! }
//!
//! Weights are relative: they are rescaled to sum to 1.0 before use.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub money: f64,
    pub passion: f64,
    pub location: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            money: 0.33,
            passion: 0.34,
            location: 0.33,
        }
    }
}

impl Weights {
    pub fn new(money: f64, passion: f64, location: f64) -> Self {
        Self {
            money,
            passion,
            location,
        }
    }

    /// Proportional rescale to a unit sum. Negative or non-finite values and
    /// an all-zero set are configuration errors.
    pub fn normalized(&self) -> Result<NormalizedWeights, ConfigError> {
        let all = [self.money, self.passion, self.location];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidWeight {
                money: self.money,
                passion: self.passion,
                location: self.location,
            });
        }
        let sum: f64 = all.iter().sum();
        if sum <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }
        Ok(NormalizedWeights {
            money: self.money / sum,
            passion: self.passion / sum,
            location: self.location / sum,
        })
    }
}

/// Weights guaranteed finite, non-negative and summing to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedWeights {
    money: f64,
    passion: f64,
    location: f64,
}

impl NormalizedWeights {
    pub fn money(&self) -> f64 {
        self.money
    }

    pub fn passion(&self) -> f64 {
        self.passion
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn sum(&self) -> f64 {
        self.money + self.passion + self.location
    }
}

impl Default for NormalizedWeights {
    fn default() -> Self {
        Self {
            money: 1.0 / 3.0,
            passion: 1.0 / 3.0,
            location: 1.0 / 3.0,
        }
    }
}

/// Load weights from a JSON file (no validation). Public for the CLI.
pub fn load_weights_file(path: &Path) -> io::Result<Weights> {
    let bytes = fs::read(path)?;
    let w: Weights = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalizes_proportionally() {
        let n = Weights::new(2.0, 1.0, 1.0).normalized().unwrap();
        assert!((n.sum() - 1.0).abs() < 1e-9);
        assert!((n.money() - 0.5).abs() < 1e-9);
        assert!((n.passion() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_negative_and_nan() {
        assert_eq!(
            Weights::new(0.0, 0.0, 0.0).normalized(),
            Err(ConfigError::ZeroWeights)
        );
        assert!(matches!(
            Weights::new(-1.0, 1.0, 1.0).normalized(),
            Err(ConfigError::InvalidWeight { .. })
        ));
        assert!(Weights::new(f64::NAN, 1.0, 1.0).normalized().is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        let mut f = fs::File::create(&path).unwrap();
        write!(f, r#"{{"money":0.6,"passion":0.2}}"#).unwrap();
        let w = load_weights_file(&path).unwrap();
        assert_eq!(w.money, 0.6);
        assert_eq!(w.location, 0.33);
    }
}
