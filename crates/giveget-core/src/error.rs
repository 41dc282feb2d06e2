//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every variant is a stable category the transport layer can map to a
/// distinct response; the payload is the human-readable reason.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request was malformed (bad id, bad price, self-targeting).
    #[error("validation error: {0}")]
    Validation(String),

    /// The request was well-formed but current state does not permit it.
    #[error("state conflict: {0}")]
    Conflict(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The id that did not resolve.
        id: i64,
    },

    /// The principal is not allowed to act on the entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}
