//! Routes for the Price Negotiation bounded context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use giveget_core::error::DomainError;
use giveget_core::record::OfferRecord;
use giveget_negotiation::application::command_handlers::{self, StartNegotiationResult};
use giveget_negotiation::application::query_handlers::{self, NegotiationView};
use giveget_negotiation::domain::commands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::notifications::notify_participants;
use crate::state::AppState;

/// Request body for POST /.
///
/// Ids and prices are accepted as JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
pub struct StartNegotiationRequest {
    /// The sale listing to make an offer on.
    pub listing_id: Option<Value>,
    /// The offered price.
    pub price: Option<Value>,
}

/// Request body for POST /negotiations/{negotiation_id}/counter.
#[derive(Debug, Deserialize)]
pub struct CounterOfferRequest {
    /// The counter price.
    pub price: Option<Value>,
}

/// Query string for GET /negotiation.
#[derive(Debug, Deserialize)]
pub struct NegotiationQuery {
    /// The listing the negotiation is about.
    pub listing_id: Option<String>,
    /// The other participant.
    pub other_user_id: Option<String>,
}

/// Response body for a submitted counter offer.
#[derive(Debug, Serialize)]
pub struct CounterOfferResponse {
    /// The new pending offer.
    pub offer: OfferRecord,
}

/// Response body for accept and reject.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// Human-readable summary.
    pub message: &'static str,
}

fn invalid_id(field: &str) -> DomainError {
    DomainError::Validation(format!("{field} must be a positive integer"))
}

fn id_from_str(field: &str, raw: &str) -> Result<i64, DomainError> {
    raw.trim().parse::<i64>().map_err(|_| invalid_id(field))
}

fn id_from_json(field: &str, value: Option<&Value>) -> Result<i64, DomainError> {
    match value {
        None | Some(Value::Null) => Err(DomainError::Validation(format!("{field} is required"))),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| invalid_id(field)),
        Some(Value::String(s)) => id_from_str(field, s),
        Some(_) => Err(invalid_id(field)),
    }
}

fn price_from_json(value: Option<&Value>) -> Result<f64, DomainError> {
    let invalid = || DomainError::Validation("price must be a number".to_owned());
    match value {
        None | Some(Value::Null) => Err(DomainError::Validation("price is required".to_owned())),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// POST /
#[instrument(skip(state, request), fields(user_id = principal.0))]
async fn start_negotiation(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<StartNegotiationRequest>,
) -> Result<(StatusCode, Json<StartNegotiationResult>), ApiError> {
    let command = commands::StartNegotiation {
        correlation_id: Uuid::new_v4(),
        buyer_id: principal.0,
        listing_id: id_from_json("listing_id", request.listing_id.as_ref())?,
        price: price_from_json(request.price.as_ref())?,
    };

    info!(correlation_id = %command.correlation_id, "handling start_negotiation command");

    let result = command_handlers::handle_start_negotiation(
        &command,
        state.clock.as_ref(),
        state.negotiation_repository.as_ref(),
        state.listing_directory.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// POST /negotiations/{negotiation_id}/counter
#[instrument(skip(state, request), fields(user_id = principal.0))]
async fn counter_offer(
    State(state): State<AppState>,
    principal: Principal,
    Path(negotiation_id): Path<String>,
    ApiJson(request): ApiJson<CounterOfferRequest>,
) -> Result<(StatusCode, Json<CounterOfferResponse>), ApiError> {
    let command = commands::CounterOffer {
        correlation_id: Uuid::new_v4(),
        principal_id: principal.0,
        negotiation_id: id_from_str("negotiation_id", &negotiation_id)?,
        price: price_from_json(request.price.as_ref())?,
    };

    info!(correlation_id = %command.correlation_id, "handling counter_offer command");

    let offer = command_handlers::handle_counter_offer(
        &command,
        state.clock.as_ref(),
        state.negotiation_repository.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CounterOfferResponse { offer })))
}

/// GET /negotiation
#[instrument(skip(state, query), fields(user_id = principal.0))]
async fn get_negotiation(
    State(state): State<AppState>,
    principal: Principal,
    ApiQuery(query): ApiQuery<NegotiationQuery>,
) -> Result<Json<NegotiationView>, ApiError> {
    let listing_id = id_from_json(
        "listing_id",
        query.listing_id.map(Value::String).as_ref(),
    )?;
    let other_user_id = id_from_json(
        "other_user_id",
        query.other_user_id.map(Value::String).as_ref(),
    )?;

    let view = query_handlers::get_negotiation(
        principal.0,
        listing_id,
        other_user_id,
        state.negotiation_repository.as_ref(),
    )
    .await?;

    Ok(Json(view))
}

/// POST /{offer_id}/accept
#[instrument(skip(state), fields(user_id = principal.0))]
async fn accept_offer(
    State(state): State<AppState>,
    principal: Principal,
    Path(offer_id): Path<String>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let command = commands::AcceptOffer {
        correlation_id: Uuid::new_v4(),
        principal_id: principal.0,
        offer_id: id_from_str("offer_id", &offer_id)?,
    };

    info!(correlation_id = %command.correlation_id, "handling accept_offer command");

    let event = command_handlers::handle_accept_offer(
        &command,
        state.clock.as_ref(),
        state.negotiation_repository.as_ref(),
        state.listing_directory.as_ref(),
    )
    .await?;

    notify_participants(state.chat_sink.as_ref(), &event).await;

    Ok(Json(TransitionResponse {
        success: true,
        message: "Offer accepted",
    }))
}

/// POST /negotiations/{negotiation_id}/reject
#[instrument(skip(state), fields(user_id = principal.0))]
async fn reject_negotiation(
    State(state): State<AppState>,
    principal: Principal,
    Path(negotiation_id): Path<String>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let command = commands::RejectNegotiation {
        correlation_id: Uuid::new_v4(),
        principal_id: principal.0,
        negotiation_id: id_from_str("negotiation_id", &negotiation_id)?,
    };

    info!(correlation_id = %command.correlation_id, "handling reject_negotiation command");

    let event = command_handlers::handle_reject_negotiation(
        &command,
        state.clock.as_ref(),
        state.negotiation_repository.as_ref(),
    )
    .await?;

    notify_participants(state.chat_sink.as_ref(), &event).await;

    Ok(Json(TransitionResponse {
        success: true,
        message: "Negotiation rejected",
    }))
}

/// Returns the router for the negotiation context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_negotiation))
        .route("/negotiation", get(get_negotiation))
        .route("/{offer_id}/accept", post(accept_offer))
        .route(
            "/negotiations/{negotiation_id}/counter",
            post(counter_offer),
        )
        .route(
            "/negotiations/{negotiation_id}/reject",
            post(reject_negotiation),
        )
}
