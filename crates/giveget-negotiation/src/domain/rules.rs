//! Transition rules for negotiations and offers.
//!
//! Everything here is a pure function over stored records. The application
//! layer calls these between reads and writes so that every write is
//! preceded by the same checks regardless of which store backs it.

use giveget_core::error::DomainError;
use giveget_core::record::{NegotiationRecord, NegotiationStatus, OfferRecord, OfferStatus, Side};

/// A validated offer price: finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    /// Validates a raw price.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the value is NaN, infinite, zero
    /// or negative.
    pub fn new(value: f64) -> Result<Self, DomainError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(DomainError::Validation(format!(
                "price must be a positive number, got {value}"
            )))
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// Rejects ids that can never name a stored row.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `id` is not positive.
pub fn ensure_valid_id(name: &str, id: i64) -> Result<(), DomainError> {
    if id > 0 {
        Ok(())
    } else {
        Err(DomainError::Validation(format!("invalid {name} id: {id}")))
    }
}

/// Derives which side `user_id` occupies in a negotiation.
///
/// Returns `None` if the user is neither the buyer nor the seller.
#[must_use]
pub fn side_of(negotiation: &NegotiationRecord, user_id: i64) -> Option<Side> {
    if user_id == negotiation.seller_id {
        Some(Side::Seller)
    } else if user_id == negotiation.buyer_id {
        Some(Side::Buyer)
    } else {
        None
    }
}

/// Like [`side_of`] but fails for outsiders.
///
/// # Errors
///
/// Returns `DomainError::Forbidden` if the user is not a party.
pub fn require_party(negotiation: &NegotiationRecord, user_id: i64) -> Result<Side, DomainError> {
    side_of(negotiation, user_id).ok_or_else(|| {
        DomainError::Forbidden(format!(
            "user {user_id} is not a party to negotiation {}",
            negotiation.id
        ))
    })
}

/// Returns the user on the other side of the negotiation from `side`.
#[must_use]
pub const fn counterparty_of(negotiation: &NegotiationRecord, side: Side) -> i64 {
    match side.opposite() {
        Side::Buyer => negotiation.buyer_id,
        Side::Seller => negotiation.seller_id,
    }
}

/// Requires the negotiation to still accept transitions.
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the negotiation is accepted or rejected.
pub fn ensure_open(negotiation: &NegotiationRecord) -> Result<(), DomainError> {
    if negotiation.status.is_terminal() {
        Err(DomainError::Conflict(format!(
            "negotiation {} is already closed ({})",
            negotiation.id, negotiation.status
        )))
    } else {
        Ok(())
    }
}

/// Returns true if `offer` closed the negotiation but the listing price
/// update failed, and `side` is the party entitled to retry it.
#[must_use]
pub fn awaits_price_update(
    negotiation: &NegotiationRecord,
    offer: &OfferRecord,
    side: Side,
) -> bool {
    negotiation.status == NegotiationStatus::Accepted
        && negotiation.accepted_offer_id == Some(offer.id)
        && negotiation.price_update_failed
        && offer.proposed_by != side
}

/// Decides what happens to the current pending offer when `side` submits a
/// new one.
///
/// Returns the id of the opposing offer to supersede, or `None` if nothing
/// is pending.
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the pending offer was proposed by
/// `side` itself: a party waits for a response before offering again.
pub fn resolve_pending(pending: Option<&OfferRecord>, side: Side) -> Result<Option<i64>, DomainError> {
    match pending {
        None => Ok(None),
        Some(offer) if offer.proposed_by == side => Err(DomainError::Conflict(format!(
            "offer {} from the {side} is still pending; wait for a response",
            offer.id
        ))),
        Some(offer) => Ok(Some(offer.id)),
    }
}

/// Checks that `side` may accept `offer`.
///
/// # Errors
///
/// Returns `DomainError::Conflict` if `side` proposed the offer, or if the
/// offer has already been accepted, rejected or superseded.
pub fn ensure_acceptable(offer: &OfferRecord, side: Side) -> Result<(), DomainError> {
    if offer.proposed_by == side {
        return Err(DomainError::Conflict(format!(
            "offer {} was proposed by you and cannot be accepted by you",
            offer.id
        )));
    }
    if offer.status != OfferStatus::Pending {
        return Err(DomainError::Conflict(format!(
            "offer {} is no longer pending ({})",
            offer.id, offer.status
        )));
    }
    Ok(())
}
