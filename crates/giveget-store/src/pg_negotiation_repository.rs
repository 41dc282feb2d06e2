//! `PostgreSQL` implementation of the `NegotiationRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use giveget_core::error::DomainError;
use giveget_core::record::{
    NegotiationRecord, NewNegotiation, NewOffer, OfferRecord, TransitionOutcome,
};
use giveget_core::repository::{NegotiationRepository, OfferTransaction};

use crate::infrastructure;

#[derive(Debug, sqlx::FromRow)]
struct NegotiationRow {
    id: i64,
    listing_id: i64,
    buyer_id: i64,
    seller_id: i64,
    status: String,
    accepted_offer_id: Option<i64>,
    price_update_failed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NegotiationRow> for NegotiationRecord {
    type Error = DomainError;

    fn try_from(row: NegotiationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            listing_id: row.listing_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            status: row.status.parse()?,
            accepted_offer_id: row.accepted_offer_id,
            price_update_failed: row.price_update_failed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: i64,
    negotiation_id: Option<i64>,
    listing_id: i64,
    buyer_id: i64,
    seller_id: i64,
    price: f64,
    status: String,
    proposed_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for OfferRecord {
    type Error = DomainError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            negotiation_id: row.negotiation_id,
            listing_id: row.listing_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            price: row.price,
            status: row.status.parse()?,
            proposed_by: row.proposed_by.parse()?,
            created_at: row.created_at,
        })
    }
}

fn convert<R, T>(row: Option<R>) -> Result<Option<T>, DomainError>
where
    T: TryFrom<R, Error = DomainError>,
{
    row.map(T::try_from).transpose()
}

/// PostgreSQL-backed negotiation repository.
#[derive(Debug, Clone)]
pub struct PgNegotiationRepository {
    pool: PgPool,
}

impl PgNegotiationRepository {
    /// Creates a new `PgNegotiationRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NegotiationRepository for PgNegotiationRepository {
    async fn find_or_create_open_negotiation(
        &self,
        negotiation: &NewNegotiation,
    ) -> Result<(NegotiationRecord, bool), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        // Creation for every buyer of a listing serialises on the listing row.
        sqlx::query("SELECT id FROM listings WHERE id = $1 FOR UPDATE")
            .bind(negotiation.listing_id)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let existing = sqlx::query_as::<_, NegotiationRow>(
            r"
            SELECT id, listing_id, buyer_id, seller_id, status, accepted_offer_id, price_update_failed,
                   created_at, updated_at
            FROM negotiations
            WHERE listing_id = $1 AND buyer_id = $2 AND seller_id = $3 AND status = 'open'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(negotiation.listing_id)
        .bind(negotiation.buyer_id)
        .bind(negotiation.seller_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infrastructure)?;

        if let Some(row) = existing {
            tx.commit().await.map_err(infrastructure)?;
            return Ok((row.try_into()?, false));
        }

        let row = sqlx::query_as::<_, NegotiationRow>(
            r"
            INSERT INTO negotiations (listing_id, buyer_id, seller_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'open', $4, $4)
            RETURNING id, listing_id, buyer_id, seller_id, status, accepted_offer_id, price_update_failed,
                      created_at, updated_at
            ",
        )
        .bind(negotiation.listing_id)
        .bind(negotiation.buyer_id)
        .bind(negotiation.seller_id)
        .bind(negotiation.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;
        Ok((row.try_into()?, true))
    }

    async fn find_negotiation(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        let row = sqlx::query_as::<_, NegotiationRow>(
            r"
            SELECT id, listing_id, buyer_id, seller_id, status, accepted_offer_id, price_update_failed,
                   created_at, updated_at
            FROM negotiations
            WHERE id = $1
            ",
        )
        .bind(negotiation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        convert(row)
    }

    async fn find_latest_between(
        &self,
        listing_id: i64,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        let row = sqlx::query_as::<_, NegotiationRow>(
            r"
            SELECT id, listing_id, buyer_id, seller_id, status, accepted_offer_id, price_update_failed,
                   created_at, updated_at
            FROM negotiations
            WHERE listing_id = $1
              AND ((buyer_id = $2 AND seller_id = $3) OR (buyer_id = $3 AND seller_id = $2))
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(listing_id)
        .bind(user_id)
        .bind(other_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        convert(row)
    }

    async fn find_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, DomainError> {
        let row = sqlx::query_as::<_, OfferRow>(
            r"
            SELECT id, negotiation_id, listing_id, buyer_id, seller_id, price, status,
                   proposed_by, created_at
            FROM offers
            WHERE id = $1
            ",
        )
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        convert(row)
    }

    async fn list_offers(&self, negotiation_id: i64) -> Result<Vec<OfferRecord>, DomainError> {
        let rows = sqlx::query_as::<_, OfferRow>(
            r"
            SELECT id, negotiation_id, listing_id, buyer_id, seller_id, price, status,
                   proposed_by, created_at
            FROM offers
            WHERE negotiation_id = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(negotiation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        rows.into_iter().map(OfferRecord::try_from).collect()
    }

    async fn begin_offer_transaction(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<(NegotiationRecord, Box<dyn OfferTransaction>)>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let row = sqlx::query_as::<_, NegotiationRow>(
            r"
            SELECT id, listing_id, buyer_id, seller_id, status, accepted_offer_id, price_update_failed,
                   created_at, updated_at
            FROM negotiations
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(negotiation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infrastructure)?;

        let Some(negotiation) = convert::<_, NegotiationRecord>(row)? else {
            return Ok(None);
        };

        let transaction = PgOfferTransaction { negotiation_id, tx };
        Ok(Some((negotiation, Box::new(transaction))))
    }

    async fn accept_offer(
        &self,
        negotiation_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let negotiation_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM negotiations WHERE id = $1 FOR UPDATE")
                .bind(negotiation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(infrastructure)?;
        if negotiation_status.as_deref() != Some("open") {
            return Ok(TransitionOutcome::NegotiationClosed);
        }

        let offer_status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM offers WHERE id = $1 AND negotiation_id = $2 FOR UPDATE",
        )
        .bind(offer_id)
        .bind(negotiation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infrastructure)?;
        if offer_status.as_deref() != Some("pending") {
            return Ok(TransitionOutcome::OfferNotPending);
        }

        let updated = sqlx::query(
            r"
            UPDATE negotiations
            SET status = 'accepted', accepted_offer_id = $2, updated_at = $3
            WHERE id = $1 AND status = 'open'
            ",
        )
        .bind(negotiation_id)
        .bind(offer_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;
        if updated.rows_affected() == 0 {
            return Ok(TransitionOutcome::NegotiationClosed);
        }

        sqlx::query(
            r"
            UPDATE offers
            SET status = CASE WHEN id = $2 THEN 'accepted' ELSE 'rejected' END
            WHERE negotiation_id = $1 AND status = 'pending'
            ",
        )
        .bind(negotiation_id)
        .bind(offer_id)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;
        Ok(TransitionOutcome::Applied)
    }

    async fn set_price_update_failed(
        &self,
        negotiation_id: i64,
        failed: bool,
    ) -> Result<bool, DomainError> {
        let updated = sqlx::query(
            r"
            UPDATE negotiations
            SET price_update_failed = $2
            WHERE id = $1 AND price_update_failed <> $2
            ",
        )
        .bind(negotiation_id)
        .bind(failed)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(updated.rows_affected() == 1)
    }

    async fn reject_negotiation(
        &self,
        negotiation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(TransitionOutcome, Option<i64>), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        // The conditioned update takes the row lock, so no submission can
        // commit between here and the offer read below.
        let updated = sqlx::query(
            r"
            UPDATE negotiations
            SET status = 'rejected', updated_at = $2
            WHERE id = $1 AND status = 'open'
            ",
        )
        .bind(negotiation_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;
        if updated.rows_affected() == 0 {
            return Ok((TransitionOutcome::NegotiationClosed, None));
        }

        let latest_offer_id: Option<i64> = sqlx::query_scalar(
            r"
            SELECT id FROM offers
            WHERE negotiation_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(negotiation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infrastructure)?;

        sqlx::query(
            "UPDATE offers SET status = 'rejected' WHERE negotiation_id = $1 AND status = 'pending'",
        )
        .bind(negotiation_id)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;
        Ok((TransitionOutcome::Applied, latest_offer_id))
    }
}

/// An open database transaction holding `FOR UPDATE` on one negotiation row.
///
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
struct PgOfferTransaction {
    negotiation_id: i64,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OfferTransaction for PgOfferTransaction {
    async fn lock_pending_offer(&mut self) -> Result<Option<OfferRecord>, DomainError> {
        let row = sqlx::query_as::<_, OfferRow>(
            r"
            SELECT id, negotiation_id, listing_id, buyer_id, seller_id, price, status,
                   proposed_by, created_at
            FROM offers
            WHERE negotiation_id = $1 AND status = 'pending'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            FOR UPDATE
            ",
        )
        .bind(self.negotiation_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        convert(row)
    }

    async fn reject_offer(&mut self, offer_id: i64) -> Result<(), DomainError> {
        sqlx::query("UPDATE offers SET status = 'rejected' WHERE id = $1 AND status = 'pending'")
            .bind(offer_id)
            .execute(&mut *self.tx)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn insert_offer(&mut self, offer: &NewOffer) -> Result<OfferRecord, DomainError> {
        let row = sqlx::query_as::<_, OfferRow>(
            r"
            INSERT INTO offers (negotiation_id, listing_id, buyer_id, seller_id, price,
                                status, proposed_by, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING id, negotiation_id, listing_id, buyer_id, seller_id, price, status,
                      proposed_by, created_at
            ",
        )
        .bind(offer.negotiation_id)
        .bind(offer.listing_id)
        .bind(offer.buyer_id)
        .bind(offer.seller_id)
        .bind(offer.price)
        .bind(offer.proposed_by.as_str())
        .bind(offer.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        row.try_into()
    }

    async fn touch_negotiation(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query("UPDATE negotiations SET updated_at = $2 WHERE id = $1")
            .bind(self.negotiation_id)
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        this.tx.commit().await.map_err(infrastructure)
    }
}
