//! Negotiation store ports.
//!
//! The store is a persistence boundary only: it performs the reads and
//! writes the engine asks for and never decides whether a transition is
//! allowed. The one exception is the conditioned terminal writes, which
//! report a lost race through [`TransitionOutcome`] instead of applying.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::record::{
    NegotiationRecord, NewNegotiation, NewOffer, OfferRecord, TransitionOutcome,
};

/// Repository for negotiations and their offers.
#[async_trait]
pub trait NegotiationRepository: Send + Sync {
    /// Returns the `open` negotiation for the exact (listing, buyer, seller)
    /// triple, inserting one if none exists. The flag is true when the
    /// negotiation was created by this call.
    ///
    /// Lookup and insert are serialised per triple, so concurrent callers
    /// for the same triple all receive the same negotiation.
    async fn find_or_create_open_negotiation(
        &self,
        negotiation: &NewNegotiation,
    ) -> Result<(NegotiationRecord, bool), DomainError>;

    /// Loads a negotiation by id.
    async fn find_negotiation(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError>;

    /// Finds the most recently created negotiation of any status on
    /// `listing_id` between the two users, in either buyer/seller ordering.
    async fn find_latest_between(
        &self,
        listing_id: i64,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError>;

    /// Loads an offer by id.
    async fn find_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, DomainError>;

    /// Lists every offer of a negotiation ordered by `(created_at, id)`.
    async fn list_offers(&self, negotiation_id: i64) -> Result<Vec<OfferRecord>, DomainError>;

    /// Opens a transaction holding an exclusive lock on the negotiation row.
    ///
    /// Concurrent transactions on the same negotiation wait here until the
    /// holder commits or drops its transaction. Returns `Ok(None)` if the
    /// negotiation does not exist.
    async fn begin_offer_transaction(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<(NegotiationRecord, Box<dyn OfferTransaction>)>, DomainError>;

    /// Atomically accepts `offer_id`: the negotiation becomes `accepted`
    /// with `accepted_offer_id` set, the offer becomes `accepted` and every
    /// other pending offer of the negotiation becomes `rejected`.
    ///
    /// Applied only if the negotiation is still `open` and the offer still
    /// `pending` when the write runs.
    async fn accept_offer(
        &self,
        negotiation_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError>;

    /// Sets or clears the failed listing update flag of a negotiation.
    ///
    /// Returns true if this call changed the flag, so of several concurrent
    /// callers clearing it exactly one sees `true`.
    async fn set_price_update_failed(
        &self,
        negotiation_id: i64,
        failed: bool,
    ) -> Result<bool, DomainError>;

    /// Atomically rejects the negotiation and every pending offer in it.
    ///
    /// Applied only if the negotiation is still `open` when the write runs.
    /// Also returns the id of the negotiation's most recent offer as seen
    /// inside the same transaction.
    async fn reject_negotiation(
        &self,
        negotiation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(TransitionOutcome, Option<i64>), DomainError>;
}

/// A write transaction scoped to one locked negotiation.
///
/// Dropping the transaction without calling [`commit`](Self::commit) rolls
/// back every write made through it.
#[async_trait]
pub trait OfferTransaction: Send {
    /// Loads the negotiation's pending offer under an exclusive lock.
    async fn lock_pending_offer(&mut self) -> Result<Option<OfferRecord>, DomainError>;

    /// Marks a pending offer as `rejected`.
    async fn reject_offer(&mut self, offer_id: i64) -> Result<(), DomainError>;

    /// Inserts a new `pending` offer.
    async fn insert_offer(&mut self, offer: &NewOffer) -> Result<OfferRecord, DomainError>;

    /// Sets the negotiation's `updated_at`.
    async fn touch_negotiation(&mut self, now: DateTime<Utc>) -> Result<(), DomainError>;

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
