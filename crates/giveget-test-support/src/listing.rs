//! In-memory `ListingDirectory` for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use giveget_core::error::DomainError;
use giveget_core::listing::{Listing, ListingDirectory, ListingKind};

/// A listing directory backed by a map. Records every price update.
#[derive(Debug, Default)]
pub struct InMemoryListingDirectory {
    listings: Mutex<HashMap<i64, Listing>>,
    price_updates: Mutex<Vec<(i64, f64)>>,
    fail_price_updates: AtomicBool,
}

impl InMemoryListingDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listing and returns the directory.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_listing(self, id: i64, owner_id: i64, kind: ListingKind, price: f64) -> Self {
        self.listings.lock().unwrap().insert(
            id,
            Listing {
                id,
                owner_id,
                kind,
                price,
            },
        );
        self
    }

    /// Makes every subsequent `update_price` fail with an infrastructure
    /// error (or succeed again when `fail` is false).
    pub fn fail_price_updates(&self, fail: bool) {
        self.fail_price_updates.store(fail, Ordering::SeqCst);
    }

    /// Returns the current price of a listing.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn price_of(&self, listing_id: i64) -> Option<f64> {
        self.listings
            .lock()
            .unwrap()
            .get(&listing_id)
            .map(|listing| listing.price)
    }

    /// Returns every `(listing_id, price)` update applied so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn price_updates(&self) -> Vec<(i64, f64)> {
        self.price_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingDirectory for InMemoryListingDirectory {
    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, DomainError> {
        Ok(self.listings.lock().unwrap().get(&listing_id).cloned())
    }

    async fn update_price(&self, listing_id: i64, price: f64) -> Result<(), DomainError> {
        if self.fail_price_updates.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("listing update timed out".into()));
        }
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .get_mut(&listing_id)
            .ok_or_else(|| DomainError::not_found("listing", listing_id))?;
        listing.price = price;
        self.price_updates.lock().unwrap().push((listing_id, price));
        Ok(())
    }
}
