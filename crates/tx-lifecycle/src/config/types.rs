//! Configuration-related types.
//!
//! Implements defaults, as well as serializing and
//! deserializing with upper-bound verification.

use core::fmt;

use serde::de::Unexpected;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Maximum memo length accepted by the SDK's default `x/auth` parameters.
pub const MAX_MEMO_LENGTH: usize = 256;

const DEFAULT_MAX_POLL_FAILURES: usize = 5;
const BOUND_MAX_POLL_FAILURES: usize = 1000;

/// A transaction memo whose length has been checked against
/// [`MAX_MEMO_LENGTH`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memo(String);

impl Memo {
    pub fn new(memo: impl Into<String>) -> Result<Self, Error> {
        let memo = memo.into();
        let length = memo.chars().count();

        if length > MAX_MEMO_LENGTH {
            return Err(Error::memo_too_long(length, MAX_MEMO_LENGTH));
        }

        Ok(Self(memo))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Memo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let memo = String::deserialize(deserializer)?;
        let length = memo.chars().count();

        if length > MAX_MEMO_LENGTH {
            return Err(D::Error::invalid_length(
                length,
                &format!("a string of at most {MAX_MEMO_LENGTH} characters").as_str(),
            ));
        }

        Ok(Memo(memo))
    }
}

impl Serialize for Memo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<Memo> for String {
    fn from(m: Memo) -> Self {
        m.0
    }
}

/// Number of consecutive failed poll queries tolerated before a submission
/// is marked as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPollFailures(usize);

impl MaxPollFailures {
    pub fn new(value: usize) -> Self {
        Self(value.clamp(1, BOUND_MAX_POLL_FAILURES))
    }
}

impl Default for MaxPollFailures {
    fn default() -> Self {
        Self(DEFAULT_MAX_POLL_FAILURES)
    }
}

impl<'de> Deserialize<'de> for MaxPollFailures {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let u = usize::deserialize(deserializer)?;

        if u == 0 || u > BOUND_MAX_POLL_FAILURES {
            return Err(D::Error::invalid_value(
                Unexpected::Unsigned(u as u64),
                &format!("a usize between 1 and {}", BOUND_MAX_POLL_FAILURES).as_str(),
            ));
        }

        Ok(MaxPollFailures(u))
    }
}

impl Serialize for MaxPollFailures {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<MaxPollFailures> for usize {
    fn from(m: MaxPollFailures) -> Self {
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
        #[serde(default)]
        memo: Memo,
        #[serde(default)]
        max_poll_failures: MaxPollFailures,
    }

    #[test]
    fn parse_defaults() {
        let config: DummyConfig = toml::from_str("").unwrap();

        assert_eq!(config.memo.as_str(), "");
        assert_eq!(usize::from(config.max_poll_failures), 5);
    }

    #[test]
    fn parse_memo_too_long() {
        let memo = "a".repeat(MAX_MEMO_LENGTH + 1);
        let toml = format!("memo = \"{memo}\"");

        assert!(toml::from_str::<DummyConfig>(&toml).is_err());
        assert!(Memo::new(memo).is_err());
    }

    #[test]
    fn memo_length_counts_characters() {
        let memo = "é".repeat(MAX_MEMO_LENGTH);
        assert!(Memo::new(memo).is_ok());
    }

    #[test]
    fn parse_zero_poll_failures() {
        assert!(toml::from_str::<DummyConfig>("max_poll_failures = 0").is_err());
    }
}
