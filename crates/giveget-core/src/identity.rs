//! Session/identity port.
//!
//! The transport layer resolves a trusted principal before calling into the
//! engine. Nothing downstream of this port reads a user id from client input.

/// Resolves a bearer credential into an authenticated user id.
pub trait IdentityResolver: Send + Sync {
    /// Returns the user id the token belongs to, or `None` if the token is
    /// missing, malformed, expired or forged.
    fn resolve(&self, token: &str) -> Option<i64>;
}
