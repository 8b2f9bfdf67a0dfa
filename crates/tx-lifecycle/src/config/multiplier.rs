use core::fmt;

use serde::de::Error as DeserializeError;
use serde::de::Unexpected;
use serde::Deserialize;
use serde::Deserializer;
use serde_derive::Serialize;

use crate::config::Error;

/// A safety multiplier applied to simulated gas or to a computed fee amount.
///
/// Values below `1.0` would under-provision the transaction and are rejected,
/// as are infinities, which cannot be turned into a fee amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Multiplier(f64);

impl Multiplier {
    pub const MIN_BOUND: f64 = 1.0;

    pub fn new(value: f64) -> Result<Self, Error> {
        if value.is_infinite() {
            return Err(Error::multiplier_not_finite(value));
        }

        if value.is_nan() || value < Self::MIN_BOUND {
            return Err(Error::multiplier_too_small(value));
        }

        Ok(Self(value))
    }

    // Bypasses the lower bound, for tests exercising the fee formula.
    pub fn unsafe_new(value: f64) -> Self {
        Self(value)
    }

    pub fn to_f64(self) -> f64 {
        self.0
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self(Self::MIN_BOUND)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Multiplier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;

        Multiplier::new(value).map_err(|_| {
            D::Error::invalid_value(
                Unexpected::Float(value),
                &format!(
                    "a finite floating-point value greater than or equal to {}",
                    Self::MIN_BOUND
                )
                .as_str(),
            )
        })
    }
}

impl From<Multiplier> for f64 {
    fn from(m: Multiplier) -> Self {
        m.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_derive::Deserialize;
    use test_log::test;

    #[derive(Debug, Deserialize)]
    struct DummyConfig {
        multiplier: Multiplier,
    }

    #[test]
    fn parse_valid_multiplier() {
        let config: DummyConfig = toml::from_str("multiplier = 1.4").unwrap();
        assert_eq!(config.multiplier.to_f64(), 1.4);

        let config: DummyConfig = toml::from_str("multiplier = 1.0").unwrap();
        assert_eq!(config.multiplier.to_f64(), 1.0);
    }

    #[test]
    fn parse_multiplier_below_bound() {
        let err = toml::from_str::<DummyConfig>("multiplier = 0.9")
            .unwrap_err()
            .to_string();

        assert!(err.contains("greater than or equal to 1"), "unexpected error: {err}");
    }

    #[test]
    fn reject_nan() {
        assert!(Multiplier::new(f64::NAN).is_err());
    }

    #[test]
    fn reject_infinity() {
        assert!(Multiplier::new(f64::INFINITY).is_err());

        let err = toml::from_str::<DummyConfig>("multiplier = inf")
            .unwrap_err()
            .to_string();

        assert!(err.contains("finite"), "unexpected error: {err}");
    }
}
