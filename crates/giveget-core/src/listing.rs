//! Listing directory port.
//!
//! Listings are owned outside the negotiation context; the engine only reads
//! their owner and kind and writes the agreed price back.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The category of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    /// An item for sale. The only kind that supports price negotiation.
    Sale,
    /// A paid job.
    Work,
    /// A request for or offer of help.
    Help,
}

impl ListingKind {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Work => "work",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(Self::Sale),
            "work" => Ok(Self::Work),
            "help" => Ok(Self::Help),
            other => Err(DomainError::Infrastructure(format!(
                "unknown listing kind '{other}'"
            ))),
        }
    }
}

/// The slice of a listing the engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing id.
    pub id: i64,
    /// The user who posted the listing.
    pub owner_id: i64,
    /// Listing category.
    pub kind: ListingKind,
    /// Current asking price.
    pub price: f64,
}

/// Read/update access to listings.
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    /// Loads a listing by id.
    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, DomainError>;

    /// Overwrites a listing's price.
    async fn update_price(&self, listing_id: i64, price: f64) -> Result<(), DomainError>;
}
