//! `PostgreSQL` implementation of the `ListingDirectory` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use giveget_core::error::DomainError;
use giveget_core::listing::{Listing, ListingDirectory};

use crate::infrastructure;

/// Reads and updates rows of the `listings` table.
#[derive(Debug, Clone)]
pub struct PgListingDirectory {
    pool: PgPool,
}

impl PgListingDirectory {
    /// Creates a new `PgListingDirectory`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingDirectory for PgListingDirectory {
    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, DomainError> {
        let row: Option<(i64, i64, String, f64)> =
            sqlx::query_as("SELECT id, owner_id, kind, price FROM listings WHERE id = $1")
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(infrastructure)?;

        row.map(|(id, owner_id, kind, price)| -> Result<Listing, DomainError> {
            Ok(Listing {
                id,
                owner_id,
                kind: kind.parse()?,
                price,
            })
        })
        .transpose()
    }

    async fn update_price(&self, listing_id: i64, price: f64) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE listings SET price = $2 WHERE id = $1")
            .bind(listing_id)
            .bind(price)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("listing", listing_id));
        }
        Ok(())
    }
}
