//! Database schema.
//!
//! The SQL lives in the workspace `migrations/` directory and is embedded
//! into the binary at compile time.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};

/// Embedded migrations for every table this workspace reads or writes.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies all pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the recorded history does
/// not match the embedded files.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
