//! `NegotiationRepository` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use giveget_core::error::DomainError;
use giveget_core::record::{
    NegotiationRecord, NegotiationStatus, NewNegotiation, NewOffer, OfferRecord, OfferStatus,
    TransitionOutcome,
};
use giveget_core::repository::{NegotiationRepository, OfferTransaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    negotiations: BTreeMap<i64, NegotiationRecord>,
    offers: BTreeMap<i64, OfferRecord>,
    last_negotiation_id: i64,
    last_offer_id: i64,
}

impl MemoryState {
    fn pending_offer(&self, negotiation_id: i64) -> Option<&OfferRecord> {
        self.offers
            .values()
            .filter(|o| o.negotiation_id == Some(negotiation_id) && o.status == OfferStatus::Pending)
            .next_back()
    }
}

/// A negotiation repository held entirely in memory.
///
/// Offer transactions hold the state's async mutex for their whole lifetime,
/// so concurrent submissions serialize exactly like row locks would, and a
/// transaction dropped without commit restores the state it started from.
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNegotiationRepository {
    state: Arc<Mutex<MemoryState>>,
    fail_offer_inserts: Arc<AtomicBool>,
}

impl InMemoryNegotiationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `insert_offer` fail with an infrastructure
    /// error (or succeed again when `fail` is false).
    pub fn fail_offer_inserts(&self, fail: bool) {
        self.fail_offer_inserts.store(fail, Ordering::SeqCst);
    }

    /// Returns a snapshot of every negotiation ordered by id.
    pub async fn negotiations(&self) -> Vec<NegotiationRecord> {
        self.state.lock().await.negotiations.values().cloned().collect()
    }

    /// Returns a snapshot of every offer ordered by id.
    pub async fn offers(&self) -> Vec<OfferRecord> {
        self.state.lock().await.offers.values().cloned().collect()
    }

    /// Inserts a negotiation row as-is, bypassing the engine.
    pub async fn seed_negotiation(&self, negotiation: NegotiationRecord) {
        let mut state = self.state.lock().await;
        state.last_negotiation_id = state.last_negotiation_id.max(negotiation.id);
        state.negotiations.insert(negotiation.id, negotiation);
    }

    /// Inserts an offer row as-is, bypassing the engine.
    pub async fn seed_offer(&self, offer: OfferRecord) {
        let mut state = self.state.lock().await;
        state.last_offer_id = state.last_offer_id.max(offer.id);
        state.offers.insert(offer.id, offer);
    }
}

#[async_trait]
impl NegotiationRepository for InMemoryNegotiationRepository {
    async fn find_or_create_open_negotiation(
        &self,
        negotiation: &NewNegotiation,
    ) -> Result<(NegotiationRecord, bool), DomainError> {
        let mut state = self.state.lock().await;
        let existing = state.negotiations.values().find(|n| {
            n.listing_id == negotiation.listing_id
                && n.buyer_id == negotiation.buyer_id
                && n.seller_id == negotiation.seller_id
                && n.status == NegotiationStatus::Open
        });
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }

        state.last_negotiation_id += 1;
        let record = NegotiationRecord {
            id: state.last_negotiation_id,
            listing_id: negotiation.listing_id,
            buyer_id: negotiation.buyer_id,
            seller_id: negotiation.seller_id,
            status: NegotiationStatus::Open,
            accepted_offer_id: None,
            price_update_failed: false,
            created_at: negotiation.created_at,
            updated_at: negotiation.created_at,
        };
        state.negotiations.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn find_negotiation(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        Ok(self.state.lock().await.negotiations.get(&negotiation_id).cloned())
    }

    async fn find_latest_between(
        &self,
        listing_id: i64,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .negotiations
            .values()
            .filter(|n| {
                n.listing_id == listing_id
                    && ((n.buyer_id == user_id && n.seller_id == other_user_id)
                        || (n.buyer_id == other_user_id && n.seller_id == user_id))
            })
            .max_by_key(|n| (n.created_at, n.id))
            .cloned())
    }

    async fn find_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, DomainError> {
        Ok(self.state.lock().await.offers.get(&offer_id).cloned())
    }

    async fn list_offers(&self, negotiation_id: i64) -> Result<Vec<OfferRecord>, DomainError> {
        let state = self.state.lock().await;
        let mut offers: Vec<OfferRecord> = state
            .offers
            .values()
            .filter(|o| o.negotiation_id == Some(negotiation_id))
            .cloned()
            .collect();
        offers.sort_by_key(|o| (o.created_at, o.id));
        Ok(offers)
    }

    async fn begin_offer_transaction(
        &self,
        negotiation_id: i64,
    ) -> Result<Option<(NegotiationRecord, Box<dyn OfferTransaction>)>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let Some(negotiation) = guard.negotiations.get(&negotiation_id).cloned() else {
            return Ok(None);
        };
        let snapshot = guard.clone();
        let transaction = MemoryOfferTransaction {
            negotiation_id,
            guard,
            snapshot: Some(snapshot),
            fail_offer_inserts: self.fail_offer_inserts.load(Ordering::SeqCst),
        };
        Ok(Some((negotiation, Box::new(transaction))))
    }

    async fn accept_offer(
        &self,
        negotiation_id: i64,
        offer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.state.lock().await;
        let open = state
            .negotiations
            .get(&negotiation_id)
            .is_some_and(|n| n.status == NegotiationStatus::Open);
        if !open {
            return Ok(TransitionOutcome::NegotiationClosed);
        }
        let pending = state.offers.get(&offer_id).is_some_and(|o| {
            o.negotiation_id == Some(negotiation_id) && o.status == OfferStatus::Pending
        });
        if !pending {
            return Ok(TransitionOutcome::OfferNotPending);
        }

        if let Some(negotiation) = state.negotiations.get_mut(&negotiation_id) {
            negotiation.status = NegotiationStatus::Accepted;
            negotiation.accepted_offer_id = Some(offer_id);
            negotiation.updated_at = now;
        }
        for offer in state.offers.values_mut() {
            if offer.negotiation_id == Some(negotiation_id) && offer.status == OfferStatus::Pending {
                offer.status = if offer.id == offer_id {
                    OfferStatus::Accepted
                } else {
                    OfferStatus::Rejected
                };
            }
        }
        Ok(TransitionOutcome::Applied)
    }

    async fn set_price_update_failed(
        &self,
        negotiation_id: i64,
        failed: bool,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        match state.negotiations.get_mut(&negotiation_id) {
            Some(negotiation) if negotiation.price_update_failed != failed => {
                negotiation.price_update_failed = failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reject_negotiation(
        &self,
        negotiation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(TransitionOutcome, Option<i64>), DomainError> {
        let mut state = self.state.lock().await;
        match state.negotiations.get_mut(&negotiation_id) {
            Some(negotiation) if negotiation.status == NegotiationStatus::Open => {
                negotiation.status = NegotiationStatus::Rejected;
                negotiation.updated_at = now;
            }
            _ => return Ok((TransitionOutcome::NegotiationClosed, None)),
        }
        let latest_offer_id = state
            .offers
            .values()
            .filter(|o| o.negotiation_id == Some(negotiation_id))
            .max_by_key(|o| (o.created_at, o.id))
            .map(|o| o.id);
        for offer in state.offers.values_mut() {
            if offer.negotiation_id == Some(negotiation_id) && offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Rejected;
            }
        }
        Ok((TransitionOutcome::Applied, latest_offer_id))
    }
}

struct MemoryOfferTransaction {
    negotiation_id: i64,
    guard: OwnedMutexGuard<MemoryState>,
    // Restored on drop unless the transaction commits.
    snapshot: Option<MemoryState>,
    fail_offer_inserts: bool,
}

impl Drop for MemoryOfferTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl OfferTransaction for MemoryOfferTransaction {
    async fn lock_pending_offer(&mut self) -> Result<Option<OfferRecord>, DomainError> {
        Ok(self.guard.pending_offer(self.negotiation_id).cloned())
    }

    async fn reject_offer(&mut self, offer_id: i64) -> Result<(), DomainError> {
        if let Some(offer) = self.guard.offers.get_mut(&offer_id) {
            if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Rejected;
            }
        }
        Ok(())
    }

    async fn insert_offer(&mut self, offer: &NewOffer) -> Result<OfferRecord, DomainError> {
        if self.fail_offer_inserts {
            return Err(DomainError::Infrastructure("offer insert failed".into()));
        }
        self.guard.last_offer_id += 1;
        let record = OfferRecord {
            id: self.guard.last_offer_id,
            negotiation_id: Some(offer.negotiation_id),
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            price: offer.price,
            status: OfferStatus::Pending,
            proposed_by: offer.proposed_by,
            created_at: offer.created_at,
        };
        self.guard.offers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn touch_negotiation(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        let negotiation_id = self.negotiation_id;
        if let Some(negotiation) = self.guard.negotiations.get_mut(&negotiation_id) {
            negotiation.updated_at = now;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let mut transaction = self;
        transaction.snapshot = None;
        Ok(())
    }
}

/// A negotiation repository that always returns an infrastructure error.
#[derive(Debug, Default)]
pub struct FailingNegotiationRepository;

fn connection_refused<T>() -> Result<T, DomainError> {
    Err(DomainError::Infrastructure("connection refused".into()))
}

#[async_trait]
impl NegotiationRepository for FailingNegotiationRepository {
    async fn find_or_create_open_negotiation(
        &self,
        _negotiation: &NewNegotiation,
    ) -> Result<(NegotiationRecord, bool), DomainError> {
        connection_refused()
    }

    async fn find_negotiation(
        &self,
        _negotiation_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        connection_refused()
    }

    async fn find_latest_between(
        &self,
        _listing_id: i64,
        _user_id: i64,
        _other_user_id: i64,
    ) -> Result<Option<NegotiationRecord>, DomainError> {
        connection_refused()
    }

    async fn find_offer(&self, _offer_id: i64) -> Result<Option<OfferRecord>, DomainError> {
        connection_refused()
    }

    async fn list_offers(&self, _negotiation_id: i64) -> Result<Vec<OfferRecord>, DomainError> {
        connection_refused()
    }

    async fn begin_offer_transaction(
        &self,
        _negotiation_id: i64,
    ) -> Result<Option<(NegotiationRecord, Box<dyn OfferTransaction>)>, DomainError> {
        connection_refused()
    }

    async fn accept_offer(
        &self,
        _negotiation_id: i64,
        _offer_id: i64,
        _now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        connection_refused()
    }

    async fn set_price_update_failed(
        &self,
        _negotiation_id: i64,
        _failed: bool,
    ) -> Result<bool, DomainError> {
        connection_refused()
    }

    async fn reject_negotiation(
        &self,
        _negotiation_id: i64,
        _now: DateTime<Utc>,
    ) -> Result<(TransitionOutcome, Option<i64>), DomainError> {
        connection_refused()
    }
}
