//! Command abstractions.

use uuid::Uuid;

/// Trait that all engine commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The authenticated user issuing the command.
    fn principal_id(&self) -> i64;
}
