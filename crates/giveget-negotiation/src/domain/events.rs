//! Observable outcomes of terminal negotiation transitions.
//!
//! The engine returns one of these from every successful accept or reject.
//! Callers turn it into exactly one chat notification and one real-time push
//! per participant.

use serde::{Deserialize, Serialize};

/// Emitted when an offer is accepted and the negotiation closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferAccepted {
    /// The negotiation identifier.
    pub negotiation_id: i64,
    /// The listing whose price was updated.
    pub listing_id: i64,
    /// The accepted offer.
    pub offer_id: i64,
    /// The agreed price.
    pub price: f64,
    /// The user who accepted.
    pub accepted_by: i64,
    /// The user who proposed the accepted offer.
    pub counterparty_id: i64,
}

/// Emitted when a party rejects the negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRejected {
    /// The negotiation identifier.
    pub negotiation_id: i64,
    /// The listing under negotiation.
    pub listing_id: i64,
    /// The most recent offer at the time of rejection, if any.
    pub latest_offer_id: Option<i64>,
    /// The user who rejected.
    pub rejected_by: i64,
    /// The other party.
    pub counterparty_id: i64,
}

/// Event type identifier for [`OfferAccepted`].
pub const OFFER_ACCEPTED_EVENT_TYPE: &str = "negotiation.offer_accepted";

/// Event type identifier for [`NegotiationRejected`].
pub const NEGOTIATION_REJECTED_EVENT_TYPE: &str = "negotiation.rejected";

/// Terminal transition outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NegotiationEvent {
    /// An offer was accepted.
    OfferAccepted(OfferAccepted),
    /// The negotiation was rejected.
    NegotiationRejected(NegotiationRejected),
}

impl NegotiationEvent {
    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OfferAccepted(_) => OFFER_ACCEPTED_EVENT_TYPE,
            Self::NegotiationRejected(_) => NEGOTIATION_REJECTED_EVENT_TYPE,
        }
    }

    /// The negotiation the event belongs to.
    #[must_use]
    pub fn negotiation_id(&self) -> i64 {
        match self {
            Self::OfferAccepted(e) => e.negotiation_id,
            Self::NegotiationRejected(e) => e.negotiation_id,
        }
    }

    /// The listing the event belongs to.
    #[must_use]
    pub fn listing_id(&self) -> i64 {
        match self {
            Self::OfferAccepted(e) => e.listing_id,
            Self::NegotiationRejected(e) => e.listing_id,
        }
    }

    /// The user whose action produced the event.
    #[must_use]
    pub fn actor_id(&self) -> i64 {
        match self {
            Self::OfferAccepted(e) => e.accepted_by,
            Self::NegotiationRejected(e) => e.rejected_by,
        }
    }

    /// The user who should be notified.
    #[must_use]
    pub fn counterparty_id(&self) -> i64 {
        match self {
            Self::OfferAccepted(e) => e.counterparty_id,
            Self::NegotiationRejected(e) => e.counterparty_id,
        }
    }

    /// Machine-parseable marker embedded in the chat notification.
    ///
    /// `[[offer:<id>:accepted:<price>]]` or `[[offer:<id|none>:rejected]]`.
    #[must_use]
    pub fn chat_marker(&self) -> String {
        match self {
            Self::OfferAccepted(e) => format!("[[offer:{}:accepted:{}]]", e.offer_id, e.price),
            Self::NegotiationRejected(e) => match e.latest_offer_id {
                Some(offer_id) => format!("[[offer:{offer_id}:rejected]]"),
                None => "[[offer:none:rejected]]".to_owned(),
            },
        }
    }

    /// Human-readable chat notification including the marker.
    #[must_use]
    pub fn chat_text(&self) -> String {
        let sentence = match self {
            Self::OfferAccepted(e) => format!("I accepted your offer of {}.", e.price),
            Self::NegotiationRejected(_) => "I declined the price negotiation.".to_owned(),
        };
        format!("{sentence} {}", self.chat_marker())
    }

    /// Payload pushed to both participants over the real-time channel.
    #[must_use]
    pub fn push_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "negotiation_updated",
            "event_type": self.event_type(),
            "negotiation_id": self.negotiation_id(),
            "listing_id": self.listing_id(),
            "event": self,
        })
    }
}
