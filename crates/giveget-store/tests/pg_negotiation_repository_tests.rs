//! Integration tests for the PostgreSQL store adapters.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use giveget_core::chat::ChatSink;
use giveget_core::error::DomainError;
use giveget_core::listing::{ListingDirectory, ListingKind};
use giveget_core::record::{
    NegotiationRecord, NegotiationStatus, NewNegotiation, NewOffer, OfferStatus, Side,
    TransitionOutcome,
};
use giveget_core::repository::NegotiationRepository;
use giveget_store::pg_chat_sink::PgChatSink;
use giveget_store::pg_listing_directory::PgListingDirectory;
use giveget_store::pg_negotiation_repository::PgNegotiationRepository;
use sqlx::PgPool;

const SELLER: i64 = 3;
const BUYER: i64 = 7;

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, minute, 0).unwrap()
}

/// Insert a listing row directly and return its id.
async fn seed_listing(pool: &PgPool, kind: &str, price: f64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO listings (owner_id, kind, title, price) VALUES ($1, $2, 'Bike', $3) RETURNING id",
    )
    .bind(SELLER)
    .bind(kind)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn new_negotiation(listing_id: i64, buyer_id: i64, minute: u32) -> NewNegotiation {
    NewNegotiation {
        listing_id,
        buyer_id,
        seller_id: SELLER,
        created_at: at(minute),
    }
}

async fn seed_negotiation(repo: &PgNegotiationRepository, listing_id: i64, minute: u32) -> NegotiationRecord {
    repo.find_or_create_open_negotiation(&new_negotiation(listing_id, BUYER, minute))
        .await
        .unwrap()
        .0
}

fn new_offer(negotiation: &NegotiationRecord, side: Side, price: f64, minute: u32) -> NewOffer {
    NewOffer {
        negotiation_id: negotiation.id,
        listing_id: negotiation.listing_id,
        buyer_id: negotiation.buyer_id,
        seller_id: negotiation.seller_id,
        price,
        proposed_by: side,
        created_at: at(minute),
    }
}

/// Insert a pending offer through a committed transaction.
async fn submit(repo: &PgNegotiationRepository, negotiation: &NegotiationRecord, side: Side, price: f64, minute: u32) -> i64 {
    let (_, mut tx) = repo
        .begin_offer_transaction(negotiation.id)
        .await
        .unwrap()
        .unwrap();
    let offer = tx.insert_offer(&new_offer(negotiation, side, price, minute)).await.unwrap();
    tx.commit().await.unwrap();
    offer.id
}

// --- negotiations ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_or_create_reuses_the_open_negotiation(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);

    // Act
    let (created, was_created) = repo
        .find_or_create_open_negotiation(&new_negotiation(listing_id, BUYER, 0))
        .await
        .unwrap();
    let (reused, was_reused_created) = repo
        .find_or_create_open_negotiation(&new_negotiation(listing_id, BUYER, 5))
        .await
        .unwrap();
    let (other_buyer, other_created) = repo
        .find_or_create_open_negotiation(&new_negotiation(listing_id, 42, 6))
        .await
        .unwrap();

    // Assert
    assert!(was_created);
    assert_eq!(created.status, NegotiationStatus::Open);
    assert_eq!(created.created_at, at(0));
    assert_eq!(created.updated_at, at(0));
    assert!(!created.price_update_failed);
    assert!(!was_reused_created);
    assert_eq!(reused, created);
    assert!(other_created);
    assert_ne!(other_buyer.id, created.id);
    assert_eq!(repo.find_negotiation(created.id).await.unwrap(), Some(created));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_find_or_create_yields_one_negotiation(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool.clone());

    // Act
    let mut tasks = Vec::new();
    for minute in 0..5 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.find_or_create_open_negotiation(&new_negotiation(listing_id, BUYER, minute))
                .await
                .unwrap()
        }));
    }
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    // Assert
    assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
    assert!(results.iter().all(|(n, _)| n.id == results[0].0.id));
    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM negotiations WHERE listing_id = $1 AND status = 'open'",
    )
    .bind(listing_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(open, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_latest_between_ignores_status_and_ordering(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let older = seed_negotiation(&repo, listing_id, 0).await;
    repo.reject_negotiation(older.id, at(1)).await.unwrap();
    let newer = seed_negotiation(&repo, listing_id, 5).await;
    assert_ne!(newer.id, older.id);

    let from_buyer = repo.find_latest_between(listing_id, BUYER, SELLER).await.unwrap();
    let from_seller = repo.find_latest_between(listing_id, SELLER, BUYER).await.unwrap();

    assert_eq!(from_buyer.as_ref().map(|n| n.id), Some(newer.id));
    assert_eq!(from_buyer, from_seller);
    assert!(repo.find_latest_between(listing_id, BUYER, 42).await.unwrap().is_none());
}

// --- offer transactions ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_begin_offer_transaction_for_missing_negotiation(pool: PgPool) {
    let repo = PgNegotiationRepository::new(pool);

    assert!(repo.begin_offer_transaction(9999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_offer_and_list_oldest_first(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;

    let first = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;
    let (_, mut tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
    let pending = tx.lock_pending_offer().await.unwrap().unwrap();
    assert_eq!(pending.id, first);
    tx.reject_offer(first).await.unwrap();
    tx.insert_offer(&new_offer(&negotiation, Side::Seller, 90.0, 2)).await.unwrap();
    tx.touch_negotiation(at(2)).await.unwrap();
    tx.commit().await.unwrap();

    let offers = repo.list_offers(negotiation.id).await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].id, first);
    assert_eq!(offers[0].status, OfferStatus::Rejected);
    assert!((offers[0].price - 80.0).abs() < f64::EPSILON);
    assert_eq!(offers[1].status, OfferStatus::Pending);
    assert_eq!(offers[1].proposed_by, Side::Seller);
    let reloaded = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(reloaded.updated_at, at(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_dropped_transaction_rolls_back(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let first = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;

    {
        let (_, mut tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
        tx.reject_offer(first).await.unwrap();
        tx.insert_offer(&new_offer(&negotiation, Side::Seller, 90.0, 2)).await.unwrap();
        // Dropped without commit.
    }

    let offers = repo.list_offers(negotiation.id).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].status, OfferStatus::Pending);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_offer_transactions_on_one_negotiation_serialize(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let (_, mut first_tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
    assert!(first_tx.lock_pending_offer().await.unwrap().is_none());

    // Act: a second transaction must wait for the first one's lock.
    let contender = {
        let repo = repo.clone();
        let negotiation_id = negotiation.id;
        tokio::spawn(async move {
            let (_, mut tx) = repo.begin_offer_transaction(negotiation_id).await.unwrap().unwrap();
            tx.lock_pending_offer().await.unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!contender.is_finished());

    let inserted = first_tx
        .insert_offer(&new_offer(&negotiation, Side::Buyer, 80.0, 1))
        .await
        .unwrap();
    first_tx.commit().await.unwrap();

    // Assert: the waiter observes the offer committed by the lock holder.
    let seen = contender.await.unwrap();
    assert_eq!(seen.map(|o| o.id), Some(inserted.id));
}

// --- terminal transitions ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_accept_offer_is_conditioned_on_open_and_pending(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let offer_id = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;

    // Act
    let first = repo.accept_offer(negotiation.id, offer_id, at(3)).await.unwrap();
    let second = repo.accept_offer(negotiation.id, offer_id, at(4)).await.unwrap();

    // Assert
    assert_eq!(first, TransitionOutcome::Applied);
    assert_eq!(second, TransitionOutcome::NegotiationClosed);
    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NegotiationStatus::Accepted);
    assert_eq!(stored.accepted_offer_id, Some(offer_id));
    assert_eq!(stored.updated_at, at(3));
    assert!(!stored.price_update_failed);
    let offer = repo.find_offer(offer_id).await.unwrap().unwrap();
    assert_eq!(offer.status, OfferStatus::Accepted);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_accepts_of_one_offer_have_one_winner(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let offer_id = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;

    // Act
    let mut tasks = Vec::new();
    for minute in [3, 4] {
        let repo = repo.clone();
        let negotiation_id = negotiation.id;
        tasks.push(tokio::spawn(async move {
            repo.accept_offer(negotiation_id, offer_id, at(minute)).await.unwrap()
        }));
    }
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    // Assert
    assert_eq!(
        outcomes.iter().filter(|o| **o == TransitionOutcome::Applied).count(),
        1
    );
    assert!(outcomes.contains(&TransitionOutcome::NegotiationClosed));
    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NegotiationStatus::Accepted);
    assert_eq!(stored.accepted_offer_id, Some(offer_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_accepts_of_different_offers_have_one_winner(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let superseded = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;
    let pending = {
        let (_, mut tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
        tx.reject_offer(superseded).await.unwrap();
        let offer = tx.insert_offer(&new_offer(&negotiation, Side::Seller, 90.0, 2)).await.unwrap();
        tx.commit().await.unwrap();
        offer.id
    };

    // Act
    let mut tasks = Vec::new();
    for offer_id in [superseded, pending] {
        let repo = repo.clone();
        let negotiation_id = negotiation.id;
        tasks.push(tokio::spawn(async move {
            (offer_id, repo.accept_offer(negotiation_id, offer_id, at(3)).await.unwrap())
        }));
    }
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    // Assert
    let winners: Vec<i64> = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == TransitionOutcome::Applied)
        .map(|(offer_id, _)| *offer_id)
        .collect();
    assert_eq!(winners, vec![pending]);
    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(stored.accepted_offer_id, Some(pending));
    let offers = repo.list_offers(negotiation.id).await.unwrap();
    assert_eq!(
        offers.iter().filter(|o| o.status == OfferStatus::Accepted).count(),
        1
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_price_update_failed_flag_changes_once(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let offer_id = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;
    repo.accept_offer(negotiation.id, offer_id, at(2)).await.unwrap();

    // Act
    let set = repo.set_price_update_failed(negotiation.id, true).await.unwrap();
    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    let mut clears = Vec::new();
    for _ in 0..3 {
        let repo = repo.clone();
        let negotiation_id = negotiation.id;
        clears.push(tokio::spawn(async move {
            repo.set_price_update_failed(negotiation_id, false).await.unwrap()
        }));
    }
    let mut cleared = 0;
    for clear in clears {
        if clear.await.unwrap() {
            cleared += 1;
        }
    }

    // Assert
    assert!(set);
    assert!(stored.price_update_failed);
    assert_eq!(cleared, 1);
    let reloaded = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert!(!reloaded.price_update_failed);
    assert!(!repo.set_price_update_failed(negotiation.id + 1000, true).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_accept_offer_refuses_superseded_offer(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let first = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;
    {
        let (_, mut tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
        tx.reject_offer(first).await.unwrap();
        tx.insert_offer(&new_offer(&negotiation, Side::Seller, 90.0, 2)).await.unwrap();
        tx.commit().await.unwrap();
    }

    let outcome = repo.accept_offer(negotiation.id, first, at(3)).await.unwrap();

    assert_eq!(outcome, TransitionOutcome::OfferNotPending);
    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NegotiationStatus::Open);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reject_negotiation_rejects_pending_offers_once(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let offer_id = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;

    assert_eq!(
        repo.reject_negotiation(negotiation.id, at(2)).await.unwrap(),
        (TransitionOutcome::Applied, Some(offer_id))
    );
    assert_eq!(
        repo.reject_negotiation(negotiation.id, at(3)).await.unwrap(),
        (TransitionOutcome::NegotiationClosed, None)
    );

    let stored = repo.find_negotiation(negotiation.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NegotiationStatus::Rejected);
    let offer = repo.find_offer(offer_id).await.unwrap().unwrap();
    assert_eq!(offer.status, OfferStatus::Rejected);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reject_without_offers_reports_none(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;

    let result = repo.reject_negotiation(negotiation.id, at(1)).await.unwrap();

    assert_eq!(result, (TransitionOutcome::Applied, None));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reject_waits_for_in_flight_offer_and_reports_it(pool: PgPool) {
    // Arrange
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let repo = PgNegotiationRepository::new(pool);
    let negotiation = seed_negotiation(&repo, listing_id, 0).await;
    let first = submit(&repo, &negotiation, Side::Buyer, 80.0, 1).await;
    let (_, mut counter_tx) = repo.begin_offer_transaction(negotiation.id).await.unwrap().unwrap();
    counter_tx.reject_offer(first).await.unwrap();
    let counter = counter_tx
        .insert_offer(&new_offer(&negotiation, Side::Seller, 90.0, 2))
        .await
        .unwrap();

    // Act: the reject blocks on the negotiation row held by the counter.
    let rejecting = {
        let repo = repo.clone();
        let negotiation_id = negotiation.id;
        tokio::spawn(async move { repo.reject_negotiation(negotiation_id, at(3)).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!rejecting.is_finished());
    counter_tx.commit().await.unwrap();

    // Assert
    assert_eq!(
        rejecting.await.unwrap(),
        (TransitionOutcome::Applied, Some(counter.id))
    );
    let offer = repo.find_offer(counter.id).await.unwrap().unwrap();
    assert_eq!(offer.status, OfferStatus::Rejected);
}

// --- collaborators ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_listing_directory_reads_and_updates_price(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let directory = PgListingDirectory::new(pool);

    let listing = directory.find_listing(listing_id).await.unwrap().unwrap();
    assert_eq!(listing.owner_id, SELLER);
    assert_eq!(listing.kind, ListingKind::Sale);

    directory.update_price(listing_id, 90.0).await.unwrap();
    let updated = directory.find_listing(listing_id).await.unwrap().unwrap();
    assert!((updated.price - 90.0).abs() < f64::EPSILON);

    assert!(directory.find_listing(listing_id + 1000).await.unwrap().is_none());
    assert!(matches!(
        directory.update_price(listing_id + 1000, 1.0).await,
        Err(DomainError::NotFound { entity: "listing", .. })
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_chat_sink_stores_messages_and_broadcasts_pushes(pool: PgPool) {
    let listing_id = seed_listing(&pool, "sale", 100.0).await;
    let sink = PgChatSink::new(pool.clone(), 16);
    let mut pushes = sink.subscribe();

    let message = sink
        .post_message(BUYER, SELLER, listing_id, "I accepted your offer of 90.")
        .await
        .unwrap();
    sink.push_to_user(SELLER, &serde_json::json!({"type": "negotiation_updated"}))
        .await
        .unwrap();

    let stored: String = sqlx::query_scalar("SELECT text FROM messages WHERE id = $1")
        .bind(message.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "I accepted your offer of 90.");
    let push = pushes.recv().await.unwrap();
    assert_eq!(push.user_id, SELLER);
    assert_eq!(push.event["type"], "negotiation_updated");
}
