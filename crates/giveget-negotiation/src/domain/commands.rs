//! Commands for the Price Negotiation context.

use giveget_core::command::Command;
use uuid::Uuid;

/// A buyer opens (or continues) a negotiation on a listing with an offer.
#[derive(Debug, Clone)]
pub struct StartNegotiation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The authenticated buyer.
    pub buyer_id: i64,
    /// The listing to negotiate.
    pub listing_id: i64,
    /// The offered price.
    pub price: f64,
}

/// Either party submits a counter-offer on an existing negotiation.
#[derive(Debug, Clone)]
pub struct CounterOffer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The authenticated user submitting the offer.
    pub principal_id: i64,
    /// The negotiation identifier.
    pub negotiation_id: i64,
    /// The offered price.
    pub price: f64,
}

/// A party accepts the other side's pending offer.
#[derive(Debug, Clone)]
pub struct AcceptOffer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The authenticated user accepting.
    pub principal_id: i64,
    /// The offer identifier.
    pub offer_id: i64,
}

/// A party walks away from a negotiation.
#[derive(Debug, Clone)]
pub struct RejectNegotiation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The authenticated user rejecting.
    pub principal_id: i64,
    /// The negotiation identifier.
    pub negotiation_id: i64,
}

impl Command for StartNegotiation {
    fn command_type(&self) -> &'static str {
        "negotiation.start"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn principal_id(&self) -> i64 {
        self.buyer_id
    }
}

impl Command for CounterOffer {
    fn command_type(&self) -> &'static str {
        "negotiation.counter_offer"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn principal_id(&self) -> i64 {
        self.principal_id
    }
}

impl Command for AcceptOffer {
    fn command_type(&self) -> &'static str {
        "negotiation.accept_offer"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn principal_id(&self) -> i64 {
        self.principal_id
    }
}

impl Command for RejectNegotiation {
    fn command_type(&self) -> &'static str {
        "negotiation.reject"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn principal_id(&self) -> i64 {
        self.principal_id
    }
}
