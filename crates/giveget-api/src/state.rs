//! Shared application state.

use std::sync::Arc;

use giveget_core::chat::ChatSink;
use giveget_core::clock::Clock;
use giveget_core::identity::IdentityResolver;
use giveget_core::listing::ListingDirectory;
use giveget_core::repository::NegotiationRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Negotiation and offer persistence.
    pub negotiation_repository: Arc<dyn NegotiationRepository>,
    /// Listing lookups and price updates.
    pub listing_directory: Arc<dyn ListingDirectory>,
    /// Chat messages and real-time pushes.
    pub chat_sink: Arc<dyn ChatSink>,
    /// Bearer token verification.
    pub identity: Arc<dyn IdentityResolver>,
    /// Clock for deterministic time.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        negotiation_repository: Arc<dyn NegotiationRepository>,
        listing_directory: Arc<dyn ListingDirectory>,
        chat_sink: Arc<dyn ChatSink>,
        identity: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            negotiation_repository,
            listing_directory,
            chat_sink,
            identity,
            clock,
        }
    }
}
