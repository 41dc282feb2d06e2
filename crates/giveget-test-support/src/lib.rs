//! Shared test doubles and utilities for the Give&Get marketplace.

mod chat;
mod clock;
mod identity;
mod listing;
mod repository;

pub use chat::{FailingChatSink, RecordingChatSink};
pub use clock::FixedClock;
pub use identity::TestIdentityResolver;
pub use listing::InMemoryListingDirectory;
pub use repository::{FailingNegotiationRepository, InMemoryNegotiationRepository};
