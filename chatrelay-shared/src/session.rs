//! Typed session schema decoded from verified bearer-token claims.
//!
//! Token verification happens at the ingress collaborator; this module only
//! lifts the already-verified claim map into an explicit schema. Missing
//! required fields are rejected here rather than coerced into zero values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated identity bound to a connection or request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub identity_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Reasons a claim map does not contain a usable session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("claims contain no session object")]
    MissingSession,
    #[error("session is malformed: {0}")]
    Malformed(String),
    #[error("session identity id is empty")]
    MissingIdentityId,
    #[error("session identity email is empty")]
    MissingEmail,
}

/// Claim-side schema, matching the identity provider's session payload:
/// `session.identity.{id, traits.email, traits.name.{first, last}}`.
#[derive(Debug, Deserialize)]
struct SessionClaim {
    identity: IdentityClaim,
}

#[derive(Debug, Deserialize)]
struct IdentityClaim {
    #[serde(default)]
    id: String,
    #[serde(default)]
    traits: TraitsClaim,
}

#[derive(Debug, Default, Deserialize)]
struct TraitsClaim {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: NameClaim,
}

#[derive(Debug, Default, Deserialize)]
struct NameClaim {
    #[serde(default)]
    first: String,
    #[serde(default)]
    last: String,
}

impl Session {
    /// Decodes a session from a verified claim map.
    ///
    /// # Errors
    /// Returns a [`SessionError`] when the `session` claim is absent,
    /// structurally malformed, or missing a required identity field.
    pub fn from_claims(claims: &serde_json::Value) -> Result<Self, SessionError> {
        let session = claims.get("session").ok_or(SessionError::MissingSession)?;
        let claim: SessionClaim = serde_json::from_value(session.clone())
            .map_err(|err| SessionError::Malformed(err.to_string()))?;

        if claim.identity.id.is_empty() {
            return Err(SessionError::MissingIdentityId);
        }
        if claim.identity.traits.email.is_empty() {
            return Err(SessionError::MissingEmail);
        }

        Ok(Session {
            identity_id: claim.identity.id,
            email: claim.identity.traits.email,
            first_name: claim.identity.traits.name.first,
            last_name: claim.identity.traits.name.last,
        })
    }
}
