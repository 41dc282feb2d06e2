//! Query handlers for the Price Negotiation context.

use giveget_core::error::DomainError;
use giveget_core::record::{NegotiationRecord, OfferRecord};
use giveget_core::repository::NegotiationRepository;
use serde::Serialize;

use crate::domain::rules;

/// Read-only view of the negotiation between two users on a listing.
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationView {
    /// The most recent negotiation, or `None` if the users never negotiated.
    pub negotiation: Option<NegotiationRecord>,
    /// Its offers, oldest first.
    pub offers: Vec<OfferRecord>,
}

/// Retrieves the most recent negotiation (any status) between the principal
/// and another user on a listing, regardless of who is the buyer.
///
/// Finding nothing is not an error; the view is then empty.
///
/// # Errors
///
/// Returns `DomainError::Validation` for non-positive ids or when the
/// principal looks up a negotiation with themselves.
pub async fn get_negotiation(
    principal_id: i64,
    listing_id: i64,
    other_user_id: i64,
    repo: &dyn NegotiationRepository,
) -> Result<NegotiationView, DomainError> {
    rules::ensure_valid_id("listing", listing_id)?;
    rules::ensure_valid_id("user", other_user_id)?;
    if principal_id == other_user_id {
        return Err(DomainError::Validation(
            "cannot look up a negotiation with yourself".to_owned(),
        ));
    }

    let Some(negotiation) = repo
        .find_latest_between(listing_id, principal_id, other_user_id)
        .await?
    else {
        return Ok(NegotiationView {
            negotiation: None,
            offers: Vec::new(),
        });
    };
    let offers = repo.list_offers(negotiation.id).await?;

    Ok(NegotiationView {
        negotiation: Some(negotiation),
        offers,
    })
}
