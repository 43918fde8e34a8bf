//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier in certrack. These prevent
//! accidental identifier confusion: a `RequestId` cannot be handed to an
//! operation that expects a `UserId`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidUuid {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user profile (owned by the identity subsystem).
    UserId,
    "user"
);

uuid_id!(
    /// Identifier of a tier-switch request.
    RequestId,
    "request"
);

uuid_id!(
    /// Identifier of a single user compliance record row.
    RecordId,
    "record"
);

uuid_id!(
    /// Identifier of an audit log entry.
    AuditEntryId,
    "audit entry"
);

/// Identifier of a requirement definition within the catalog.
///
/// A short slug such as `it-security-awareness`. Stable across catalog
/// revisions: reconciliation matches records to definitions by this id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequirementId(String);

impl RequirementId {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 128;

    /// Create a validated requirement identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b'.'));
        if valid {
            Ok(Self(s))
        } else {
            Err(ValidationError::InvalidRequirementId(s))
        }
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RequirementId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RequirementId> for String {
    fn from(id: RequirementId) -> Self {
        id.0
    }
}

impl FromStr for RequirementId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for RequirementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_id_accepts_slugs() {
        assert!(RequirementId::new("it-security-awareness").is_ok());
        assert!(RequirementId::new("hr.policy_ack.v2").is_ok());
    }

    #[test]
    fn requirement_id_rejects_empty_and_uppercase() {
        assert!(RequirementId::new("").is_err());
        assert!(RequirementId::new("IT-MFA").is_err());
        assert!(RequirementId::new("has space").is_err());
        assert!(RequirementId::new("a".repeat(RequirementId::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn requirement_id_deserialize_validates() {
        let ok: Result<RequirementId, _> = serde_json::from_str("\"it-mfa\"");
        assert_eq!(ok.unwrap().as_str(), "it-mfa");
        let bad: Result<RequirementId, _> = serde_json::from_str("\"Bad Id\"");
        assert!(bad.is_err());
    }

    #[test]
    fn user_id_serializes_as_bare_uuid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    #[test]
    fn user_id_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        assert!(err.to_string().contains("user"));
    }
}
