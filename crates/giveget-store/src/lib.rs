//! Give&Get Store: PostgreSQL adapters.
//!
//! Implements the negotiation repository and the listing and chat
//! collaborator ports on top of a shared `PgPool`.

pub mod pg_chat_sink;
pub mod pg_listing_directory;
pub mod pg_negotiation_repository;
pub mod schema;

/// Converts a driver error into the domain's infrastructure category.
pub(crate) fn infrastructure(err: sqlx::Error) -> giveget_core::error::DomainError {
    giveget_core::error::DomainError::Infrastructure(err.to_string())
}
