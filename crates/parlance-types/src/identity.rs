//! Branded identifier type.
//!
//! [`Identifier`] wraps a validated UUID. The inner value is private, so an
//! identifier can only be obtained through `generate`, `generate_many`,
//! `parse`, or deserialization (which routes through `parse`) -- never by
//! wrapping an arbitrary string.

use serde::{Deserialize, Serialize};
use uuid::{Uuid, Variant};

use std::fmt;
use std::str::FromStr;

use crate::error::IdentityError;

/// Externally-facing entity identifier.
///
/// Equality and hashing operate on the underlying 128-bit value, so two
/// identifiers compare equal exactly when their canonical string forms match
/// case-insensitively -- parsing normalizes the textual representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(Uuid);

impl Identifier {
    /// Generate a new random version-4 identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Generate `n` fresh identifiers.
    ///
    /// Fails with `InvalidArgument` when `n` is zero.
    pub fn generate_many(n: usize) -> Result<Vec<Self>, IdentityError> {
        if n == 0 {
            return Err(IdentityError::InvalidArgument(
                "identifier count must be positive".to_string(),
            ));
        }
        Ok((0..n).map(|_| Self::generate()).collect())
    }

    /// Parse an identifier from its 36-character hyphenated or 32-character
    /// compact form, case-insensitively.
    ///
    /// Rejects any other shape (including braced and URN forms), version
    /// nibbles outside 1-5, and non-RFC-4122 variants.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        if s.len() != 36 && s.len() != 32 {
            return Err(IdentityError::InvalidFormat(format!(
                "expected 32 or 36 characters, got {}",
                s.len()
            )));
        }

        let uuid =
            Uuid::try_parse(s).map_err(|e| IdentityError::InvalidFormat(e.to_string()))?;

        let version = uuid.get_version_num();
        if !(1..=5).contains(&version) {
            return Err(IdentityError::InvalidFormat(format!(
                "unsupported version nibble: {version}"
            )));
        }
        if uuid.get_variant() != Variant::RFC4122 {
            return Err(IdentityError::InvalidFormat(
                "variant nibble is not RFC 4122".to_string(),
            ));
        }

        Ok(Self(uuid))
    }

    /// Extract the version nibble of a structurally well-formed UUID string.
    ///
    /// Returns `None` for malformed input instead of failing, so callers can
    /// distinguish "not a valid identifier" from "valid but unexpected
    /// version".
    pub fn version_of(s: &str) -> Option<u8> {
        if s.len() != 36 && s.len() != 32 {
            return None;
        }
        let uuid = Uuid::try_parse(s).ok()?;
        Some(uuid.get_version_num() as u8)
    }

    /// The version nibble of this identifier (1-5).
    pub fn version(&self) -> u8 {
        self.0.get_version_num() as u8
    }

    /// The 32-character compact (unhyphenated) lowercase form.
    pub fn compact(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}
