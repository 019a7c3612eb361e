//! Blueprint schema version handling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The set of `schema_version` values this build of iceOS accepts.
///
/// Checked as the first validation step when a blueprint is loaded, before
/// any node-level validation runs.
pub const ACCEPTED_SCHEMA_VERSIONS: &[&str] = &["1.1.0"];

/// A blueprint schema version string, validated against
/// [`ACCEPTED_SCHEMA_VERSIONS`] at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion(String);

/// The version string did not match any accepted schema version.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unsupported schema_version {0:?}, expected one of {1:?}")]
pub struct UnsupportedSchemaVersion(pub String, pub &'static [&'static str]);

impl SchemaVersion {
    /// Validate a schema version string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, UnsupportedSchemaVersion> {
        let raw = raw.into();
        if ACCEPTED_SCHEMA_VERSIONS.contains(&raw.as_str()) {
            Ok(Self(raw))
        } else {
            Err(UnsupportedSchemaVersion(raw, ACCEPTED_SCHEMA_VERSIONS))
        }
    }

    /// Borrow the version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = UnsupportedSchemaVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SchemaVersion> for String {
    fn from(value: SchemaVersion) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_version() {
        assert!(SchemaVersion::parse("1.1.0").is_ok());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SchemaVersion::parse("2.0.0").unwrap_err();
        assert_eq!(err.0, "2.0.0");
    }

    #[test]
    fn display_matches_input() {
        let v = SchemaVersion::parse("1.1.0").unwrap();
        assert_eq!(v.to_string(), "1.1.0");
    }
}
