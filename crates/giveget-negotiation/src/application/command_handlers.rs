//! Command handlers for the Price Negotiation context.
//!
//! Each handler validates its command, reads the records it needs, applies
//! the domain rules and writes through the repository. Offer submission runs
//! inside an `OfferTransaction` that holds the negotiation lock, so two
//! submissions on the same negotiation never both observe "nothing pending".

use giveget_core::clock::Clock;
use giveget_core::command::Command;
use giveget_core::error::DomainError;
use giveget_core::listing::{ListingDirectory, ListingKind};
use giveget_core::record::{NewNegotiation, NewOffer, OfferRecord, Side, TransitionOutcome};
use giveget_core::repository::NegotiationRepository;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::commands::{AcceptOffer, CounterOffer, RejectNegotiation, StartNegotiation};
use crate::domain::events::{NegotiationEvent, NegotiationRejected, OfferAccepted};
use crate::domain::rules::{self, Price};

/// Result of a successfully handled `StartNegotiation` command.
#[derive(Debug, Clone, Serialize)]
pub struct StartNegotiationResult {
    /// The negotiation the offer was placed in (reused or newly created).
    pub negotiation_id: i64,
    /// The new pending offer.
    pub offer: OfferRecord,
}

/// Handles the `StartNegotiation` command: resolves the seller from the
/// listing, reuses or creates the open negotiation, and submits the buyer's
/// offer.
///
/// The negotiation is found or created under a per-triple lock before the
/// offer transaction begins, so concurrent first offers share one
/// negotiation. If the offer insert then fails, the empty open negotiation
/// stays behind and is reused by the next attempt.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a bad listing id or price, a
/// non-sale listing, or an offer on the buyer's own listing;
/// `DomainError::NotFound` if the listing does not exist;
/// `DomainError::Conflict` if the buyer already has a pending offer or the
/// negotiation closed in the meantime.
pub async fn handle_start_negotiation(
    command: &StartNegotiation,
    clock: &dyn Clock,
    repo: &dyn NegotiationRepository,
    listings: &dyn ListingDirectory,
) -> Result<StartNegotiationResult, DomainError> {
    rules::ensure_valid_id("listing", command.listing_id)?;
    let price = Price::new(command.price)?;

    let listing = listings
        .find_listing(command.listing_id)
        .await?
        .ok_or_else(|| DomainError::not_found("listing", command.listing_id))?;
    if listing.kind != ListingKind::Sale {
        return Err(DomainError::Validation(format!(
            "price offers are only available on sale listings, listing {} is '{}'",
            listing.id, listing.kind
        )));
    }
    if listing.owner_id == command.buyer_id {
        return Err(DomainError::Validation(
            "you cannot make an offer on your own listing".to_owned(),
        ));
    }
    let seller_id = listing.owner_id;

    let (negotiation, created) = repo
        .find_or_create_open_negotiation(&NewNegotiation {
            listing_id: listing.id,
            buyer_id: command.buyer_id,
            seller_id,
            created_at: clock.now(),
        })
        .await?;
    if created {
        info!(
            negotiation_id = negotiation.id,
            listing_id = listing.id,
            buyer_id = command.buyer_id,
            seller_id,
            "opened negotiation"
        );
    }
    rules::ensure_open(&negotiation)?;

    let offer = submit_offer(command, negotiation.id, Side::Buyer, price, clock, repo).await?;

    Ok(StartNegotiationResult {
        negotiation_id: negotiation.id,
        offer,
    })
}

/// Handles the `CounterOffer` command: either party submits a new price on
/// an open negotiation, superseding the other side's pending offer.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a bad id or price;
/// `DomainError::NotFound` if the negotiation does not exist;
/// `DomainError::Forbidden` if the principal is not a party;
/// `DomainError::Conflict` if the negotiation is closed or the principal's
/// own previous offer is still pending.
pub async fn handle_counter_offer(
    command: &CounterOffer,
    clock: &dyn Clock,
    repo: &dyn NegotiationRepository,
) -> Result<OfferRecord, DomainError> {
    rules::ensure_valid_id("negotiation", command.negotiation_id)?;
    let price = Price::new(command.price)?;

    let negotiation = repo
        .find_negotiation(command.negotiation_id)
        .await?
        .ok_or_else(|| DomainError::not_found("negotiation", command.negotiation_id))?;
    let side = rules::require_party(&negotiation, command.principal_id)?;
    rules::ensure_open(&negotiation)?;

    submit_offer(command, negotiation.id, side, price, clock, repo).await
}

/// Takes one turn in a negotiation under its lock.
///
/// Every early return drops the transaction, which rolls back any write
/// already made through it.
async fn submit_offer(
    command: &dyn Command,
    negotiation_id: i64,
    side: Side,
    price: Price,
    clock: &dyn Clock,
    repo: &dyn NegotiationRepository,
) -> Result<OfferRecord, DomainError> {
    let (negotiation, mut transaction) = repo
        .begin_offer_transaction(negotiation_id)
        .await?
        .ok_or_else(|| DomainError::not_found("negotiation", negotiation_id))?;
    // Re-checked under the lock: an accept or reject may have landed since
    // the unlocked read.
    rules::ensure_open(&negotiation)?;

    let pending = transaction.lock_pending_offer().await?;
    let superseded = match rules::resolve_pending(pending.as_ref(), side) {
        Ok(superseded) => superseded,
        Err(err) => {
            warn!(
                correlation_id = %command.correlation_id(),
                principal_id = command.principal_id(),
                negotiation_id,
                %side,
                "rejected duplicate offer submission"
            );
            return Err(err);
        }
    };
    if let Some(offer_id) = superseded {
        transaction.reject_offer(offer_id).await?;
        debug!(negotiation_id, offer_id, "superseded pending offer");
    }

    let now = clock.now();
    let offer = transaction
        .insert_offer(&NewOffer {
            negotiation_id,
            listing_id: negotiation.listing_id,
            buyer_id: negotiation.buyer_id,
            seller_id: negotiation.seller_id,
            price: price.value(),
            proposed_by: side,
            created_at: now,
        })
        .await?;
    transaction.touch_negotiation(now).await?;
    transaction.commit().await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        principal_id = command.principal_id(),
        negotiation_id,
        offer_id = offer.id,
        %side,
        "submitted offer"
    );
    Ok(offer)
}

/// Handles the `AcceptOffer` command: closes the negotiation on the given
/// offer, rejects anything else pending and sets the listing price.
///
/// If the listing update fails after the negotiation closed, the failure is
/// recorded and the same call from the same party later retries the price
/// update instead of reporting a conflict.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the offer or its negotiation does not
/// exist; `DomainError::Validation` if the offer has no negotiation link;
/// `DomainError::Forbidden` if the principal is not a party;
/// `DomainError::Conflict` if the negotiation is closed, the principal
/// proposed the offer, or the offer is no longer pending;
/// `DomainError::Infrastructure` if the listing price could not be set.
pub async fn handle_accept_offer(
    command: &AcceptOffer,
    clock: &dyn Clock,
    repo: &dyn NegotiationRepository,
    listings: &dyn ListingDirectory,
) -> Result<NegotiationEvent, DomainError> {
    rules::ensure_valid_id("offer", command.offer_id)?;

    let offer = repo
        .find_offer(command.offer_id)
        .await?
        .ok_or_else(|| DomainError::not_found("offer", command.offer_id))?;
    let negotiation_id = offer.negotiation_id.ok_or_else(|| {
        DomainError::Validation(format!(
            "offer {} is not linked to a negotiation",
            offer.id
        ))
    })?;
    let negotiation = repo
        .find_negotiation(negotiation_id)
        .await?
        .ok_or_else(|| DomainError::not_found("negotiation", negotiation_id))?;
    let side = rules::require_party(&negotiation, command.principal_id)?;

    let resuming = rules::awaits_price_update(&negotiation, &offer, side);
    if resuming {
        info!(
            correlation_id = %command.correlation_id,
            negotiation_id,
            offer_id = offer.id,
            "resuming listing price update"
        );
    } else {
        rules::ensure_open(&negotiation)?;
        rules::ensure_acceptable(&offer, side)?;

        match repo
            .accept_offer(negotiation_id, offer.id, clock.now())
            .await?
        {
            TransitionOutcome::Applied => {}
            TransitionOutcome::NegotiationClosed => {
                warn!(negotiation_id, offer_id = offer.id, "lost accept race");
                return Err(DomainError::Conflict(format!(
                    "negotiation {negotiation_id} is already closed"
                )));
            }
            TransitionOutcome::OfferNotPending => {
                return Err(DomainError::Conflict(format!(
                    "offer {} is no longer pending",
                    offer.id
                )));
            }
        }
    }

    if let Err(err) = listings
        .update_price(negotiation.listing_id, offer.price)
        .await
    {
        error!(
            correlation_id = %command.correlation_id,
            negotiation_id,
            offer_id = offer.id,
            listing_id = negotiation.listing_id,
            error = %err,
            "negotiation accepted but listing price not updated"
        );
        if !resuming {
            let recorded = repo.set_price_update_failed(negotiation_id, true).await;
            if let Err(flag_err) = recorded {
                error!(negotiation_id, error = %flag_err, "could not record failed listing update");
            }
        }
        return Err(err);
    }
    // Of several concurrent retries only the one that clears the flag succeeds.
    if resuming && !repo.set_price_update_failed(negotiation_id, false).await? {
        return Err(DomainError::Conflict(format!(
            "negotiation {negotiation_id} is already closed"
        )));
    }

    info!(
        correlation_id = %command.correlation_id,
        negotiation_id,
        offer_id = offer.id,
        listing_id = negotiation.listing_id,
        price = offer.price,
        "accepted offer"
    );

    Ok(NegotiationEvent::OfferAccepted(OfferAccepted {
        negotiation_id,
        listing_id: negotiation.listing_id,
        offer_id: offer.id,
        price: offer.price,
        accepted_by: command.principal_id,
        counterparty_id: rules::counterparty_of(&negotiation, side),
    }))
}

/// Handles the `RejectNegotiation` command: closes the negotiation and
/// rejects every pending offer in it. The listing is left untouched.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a bad id; `DomainError::NotFound`
/// if the negotiation does not exist; `DomainError::Forbidden` if the
/// principal is not a party; `DomainError::Conflict` if it is already
/// closed.
pub async fn handle_reject_negotiation(
    command: &RejectNegotiation,
    clock: &dyn Clock,
    repo: &dyn NegotiationRepository,
) -> Result<NegotiationEvent, DomainError> {
    rules::ensure_valid_id("negotiation", command.negotiation_id)?;

    let negotiation = repo
        .find_negotiation(command.negotiation_id)
        .await?
        .ok_or_else(|| DomainError::not_found("negotiation", command.negotiation_id))?;
    let side = rules::require_party(&negotiation, command.principal_id)?;
    rules::ensure_open(&negotiation)?;

    let latest_offer_id = match repo.reject_negotiation(negotiation.id, clock.now()).await? {
        (TransitionOutcome::Applied, latest_offer_id) => latest_offer_id,
        (TransitionOutcome::NegotiationClosed | TransitionOutcome::OfferNotPending, _) => {
            return Err(DomainError::Conflict(format!(
                "negotiation {} is already closed",
                negotiation.id
            )));
        }
    };

    info!(
        correlation_id = %command.correlation_id,
        negotiation_id = negotiation.id,
        %side,
        "rejected negotiation"
    );

    Ok(NegotiationEvent::NegotiationRejected(NegotiationRejected {
        negotiation_id: negotiation.id,
        listing_id: negotiation.listing_id,
        latest_offer_id,
        rejected_by: command.principal_id,
        counterparty_id: rules::counterparty_of(&negotiation, side),
    }))
}
