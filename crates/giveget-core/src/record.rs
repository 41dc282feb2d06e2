//! Persisted negotiation and offer records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle status of a negotiation.
///
/// `Open` is the only non-terminal state; `Accepted` and `Rejected` never
/// transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    /// Offers may still be submitted, accepted or the thread rejected.
    Open,
    /// An offer was accepted (terminal).
    Accepted,
    /// One party rejected the negotiation (terminal).
    Rejected,
}

impl NegotiationStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NegotiationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Infrastructure(format!(
                "unknown negotiation status '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of a single offer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Awaiting a response from the other side.
    Pending,
    /// Accepted; closes the negotiation (terminal).
    Accepted,
    /// Rejected explicitly or superseded by a counter-offer (terminal).
    Rejected,
}

impl OfferStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Infrastructure(format!(
                "unknown offer status '{other}'"
            ))),
        }
    }
}

/// Which side of a negotiation a user occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The user who initiated the negotiation.
    Buyer,
    /// The owner of the listing.
    Seller,
}

impl Side {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
        }
    }

    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            other => Err(DomainError::Infrastructure(format!(
                "unknown offer side '{other}'"
            ))),
        }
    }
}

/// A stored negotiation between one buyer and one seller over one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRecord {
    /// Surrogate key.
    pub id: i64,
    /// The listing being negotiated.
    pub listing_id: i64,
    /// The buyer. Never changes after creation.
    pub buyer_id: i64,
    /// The seller (listing owner). Never changes after creation.
    pub seller_id: i64,
    /// Current lifecycle status.
    pub status: NegotiationStatus,
    /// The accepted offer, set only when `status` is `Accepted`.
    pub accepted_offer_id: Option<i64>,
    /// True while the listing price update for the accepted offer has failed
    /// and not yet been retried successfully.
    pub price_update_failed: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state change or offer submission.
    pub updated_at: DateTime<Utc>,
}

impl NegotiationRecord {
    /// Returns true if `user_id` is the buyer or the seller.
    #[must_use]
    pub fn is_party(&self, user_id: i64) -> bool {
        user_id == self.buyer_id || user_id == self.seller_id
    }
}

/// A stored offer. Price and proposer never change once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Surrogate key.
    pub id: i64,
    /// Owning negotiation. `None` only for legacy rows without a link.
    pub negotiation_id: Option<i64>,
    /// Denormalized listing id.
    pub listing_id: i64,
    /// Denormalized buyer id.
    pub buyer_id: i64,
    /// Denormalized seller id.
    pub seller_id: i64,
    /// Proposed price.
    pub price: f64,
    /// Current status.
    pub status: OfferStatus,
    /// Which side proposed the offer.
    pub proposed_by: Side,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Values for inserting a new negotiation.
#[derive(Debug, Clone)]
pub struct NewNegotiation {
    /// The listing being negotiated.
    pub listing_id: i64,
    /// The buyer.
    pub buyer_id: i64,
    /// The seller.
    pub seller_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Values for inserting a new pending offer.
#[derive(Debug, Clone)]
pub struct NewOffer {
    /// Owning negotiation.
    pub negotiation_id: i64,
    /// Denormalized listing id.
    pub listing_id: i64,
    /// Denormalized buyer id.
    pub buyer_id: i64,
    /// Denormalized seller id.
    pub seller_id: i64,
    /// Proposed price.
    pub price: f64,
    /// Which side proposes the offer.
    pub proposed_by: Side,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Result of a conditioned terminal transition on a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was applied.
    Applied,
    /// The negotiation was no longer open when the write ran.
    NegotiationClosed,
    /// The target offer was no longer pending when the write ran.
    OfferNotPending,
}
