//! Test identity resolver.

use giveget_core::identity::IdentityResolver;

/// Accepts tokens of the form `user-<id>` and resolves them to `<id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestIdentityResolver;

impl TestIdentityResolver {
    /// Returns the bearer token that resolves to `user_id`.
    #[must_use]
    pub fn token_for(user_id: i64) -> String {
        format!("user-{user_id}")
    }
}

impl IdentityResolver for TestIdentityResolver {
    fn resolve(&self, token: &str) -> Option<i64> {
        token
            .strip_prefix("user-")
            .and_then(|id| id.parse::<i64>().ok())
            .filter(|id| *id > 0)
    }
}
