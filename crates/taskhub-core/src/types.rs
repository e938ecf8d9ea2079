//! Validated newtype wrappers for core domain primitives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum display name length, in characters.
pub const DISPLAY_NAME_MAX: usize = 255;

/// Error returned when a domain value fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The value is empty.
    #[error("value must not be empty")]
    Empty,
    /// The value exceeds the maximum length.
    #[error("value exceeds maximum length of {max} characters (got {got})")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        got: usize,
    },
    /// The value is not a positive integer.
    #[error("expected a positive integer identifier, got {0:?}")]
    InvalidId(String),
    /// The value names no known role.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// The stable numeric identifier asserted by the external identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ExternalId(i64);

impl ExternalId {
    /// Wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidId`] if `id` is zero or negative.
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        if id <= 0 {
            return Err(ValidationError::InvalidId(id.to_string()));
        }
        Ok(Self(id))
    }

    /// Return the raw identifier.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for ExternalId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidId(s.to_owned()))?;
        Self::new(id)
    }
}

impl TryFrom<i64> for ExternalId {
    type Error = ValidationError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ExternalId> for i64 {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-facing display name (trimmed, 1–255 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Create a new `DisplayName`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the trimmed name is empty or longer
    /// than [`DISPLAY_NAME_MAX`] characters.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        let got = trimmed.chars().count();
        if got > DISPLAY_NAME_MAX {
            return Err(ValidationError::TooLong {
                max: DISPLAY_NAME_MAX,
                got,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Trim `name` and cut it to [`DISPLAY_NAME_MAX`] characters.
    ///
    /// For names taken from an external provider, which are kept rather than
    /// rejected when too long. Returns `None` when nothing is left.
    #[must_use]
    pub fn truncated(name: &str) -> Option<Self> {
        let cut: String = name.trim().chars().take(DISPLAY_NAME_MAX).collect();
        let cut = cut.trim_end();
        if cut.is_empty() {
            None
        } else {
            Some(Self(cut.to_owned()))
        }
    }

    /// Return the inner name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ValidationError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(&name)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of principal roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Takes tasks and submits proof. Assigned on first sign-in.
    #[default]
    Executor,
    /// Reviews submitted proof.
    Manager,
}

impl Role {
    /// Return the stable storage key for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executor => "executor",
            Self::Manager => "manager",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "executor" => Ok(Self::Executor),
            "manager" => Ok(Self::Manager),
            other => Err(ValidationError::UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_rejects_non_positive() {
        assert!(ExternalId::new(0).is_err());
        assert!(ExternalId::new(-7).is_err());
        assert_eq!(ExternalId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn truncated_keeps_the_first_characters() {
        let long = format!("  {}  ", "ё".repeat(DISPLAY_NAME_MAX + 10));
        let name = DisplayName::truncated(&long).unwrap();
        assert_eq!(name.as_str().chars().count(), DISPLAY_NAME_MAX);
        assert!(DisplayName::new(name.as_str()).is_ok());
        assert!(DisplayName::truncated(" \t ").is_none());
        assert_eq!(DisplayName::truncated(" bob ").unwrap().as_str(), "bob");
    }

    #[test]
    fn display_name_counts_chars_not_bytes() {
        let name = "ё".repeat(DISPLAY_NAME_MAX);
        assert!(DisplayName::new(&name).is_ok());
        let too_long = "ё".repeat(DISPLAY_NAME_MAX + 1);
        assert_eq!(
            DisplayName::new(&too_long),
            Err(ValidationError::TooLong {
                max: DISPLAY_NAME_MAX,
                got: DISPLAY_NAME_MAX + 1
            })
        );
    }
}
