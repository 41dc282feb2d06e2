//! Chat and push fan-out after a committed negotiation transition.

use giveget_core::chat::ChatSink;
use giveget_negotiation::domain::events::NegotiationEvent;
use tracing::{info, warn};

/// Posts the transition's chat message from the actor to the counterparty,
/// then pushes the update to both participants.
///
/// The transition is already committed when this runs, so failures are
/// logged and swallowed.
pub async fn notify_participants(chat: &dyn ChatSink, event: &NegotiationEvent) {
    let actor_id = event.actor_id();
    let counterparty_id = event.counterparty_id();

    match chat
        .post_message(actor_id, counterparty_id, event.listing_id(), &event.chat_text())
        .await
    {
        Ok(message) => info!(
            message_id = message.id,
            negotiation_id = event.negotiation_id(),
            event_type = event.event_type(),
            "posted negotiation chat message"
        ),
        Err(e) => warn!(
            error = %e,
            negotiation_id = event.negotiation_id(),
            "failed to post negotiation chat message"
        ),
    }

    let payload = event.push_payload();
    for user_id in [actor_id, counterparty_id] {
        if let Err(e) = chat.push_to_user(user_id, &payload).await {
            warn!(error = %e, user_id, "failed to push negotiation update");
        }
    }
}
