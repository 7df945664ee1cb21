//! Request handlers
//!
//! The HTTP surface of the matchmaking core: join/cancel pairing,
//! authenticated result submission, and a health probe.

use super::{
    auth::{bearer_token, verify_token},
    errors::ApiError,
    middleware::RequestId,
    models::*,
};
use crate::{
    cleanup::CleanupSupervisor,
    config::MatchwireConfig,
    fanout::{Channel, Event, EventBus},
    matchmaker::{JoinOutcome, Matchmaker},
    rooms::RoomRegistry,
    settlement::SettlementEngine,
    store::AtomicStore,
};
use axum::{extract::State, http::HeaderMap, Extension, Json};
use std::sync::Arc;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub matchmaker: Matchmaker,
    pub rooms: Arc<RoomRegistry>,
    pub settlement: SettlementEngine,
    pub bus: Arc<dyn EventBus>,
    pub cleanup: CleanupSupervisor,
    pub auth_secret: String,
}

impl AppState {
    pub fn new(
        config: &MatchwireConfig,
        store: Arc<dyn AtomicStore>,
        bus: Arc<dyn EventBus>,
    ) -> Arc<Self> {
        let rooms = Arc::new(RoomRegistry::new(
            Arc::clone(&store),
            config.matchmaking.room_prefix.clone(),
        ));
        Arc::new(Self {
            matchmaker: Matchmaker::new(
                Arc::clone(&store),
                config.matchmaking.queue_prefix.clone(),
            ),
            settlement: SettlementEngine::new(Arc::clone(&store), Arc::clone(&rooms)),
            cleanup: CleanupSupervisor::new(
                Arc::clone(&bus),
                Arc::clone(&rooms),
                config.grace_period(),
            ),
            rooms,
            bus,
            auth_secret: config.auth.secret.clone(),
        })
    }
}

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler() -> &'static str {
    "OK"
}

/// Attempt to pair the caller with a waiting opponent on the same tier.
/// POST /match/join
pub async fn join_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let outcome = state
        .matchmaker
        .join(&request.user_id, request.bet)
        .await
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;

    let opponent = match outcome {
        JoinOutcome::Waiting => return Ok(Json(JoinResponse::waiting())),
        JoinOutcome::Matched { opponent } => opponent,
    };

    // materialize the room before either side hears about the match
    let room_id = state
        .rooms
        .create(&request.user_id, &opponent, request.bet)
        .await
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;

    // direct notification on both personal channels; either user may be
    // connected to a different worker process
    let notifications = [
        (
            Channel::User(request.user_id.clone()),
            Event::Matched {
                opponent: opponent.clone(),
                room_id: room_id.clone(),
            },
        ),
        (
            Channel::User(opponent.clone()),
            Event::Matched {
                opponent: request.user_id.clone(),
                room_id: room_id.clone(),
            },
        ),
    ];
    for (channel, event) in &notifications {
        state
            .bus
            .publish(channel, event)
            .await
            .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    }

    info!(user_id = %request.user_id, opponent, room_id, "pair notified");
    Ok(Json(JoinResponse::matched(opponent, room_id)))
}

/// Remove the caller's tickets from the tier queue.
/// POST /match/cancel
pub async fn cancel_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    state
        .matchmaker
        .cancel(&request.user_id, request.bet)
        .await
        .map_err(|e| ApiError::from_core(request_id.0, e))?;
    Ok(Json(CancelResponse { cancelled: true }))
}

/// Settle a finished match and broadcast the outcome to the room.
/// POST /match/result (authenticated)
pub async fn result_handler(
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResultRequest>,
) -> Result<Json<ResultResponse>, ApiError> {
    // reject before any state mutation
    let claims = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(request_id.0.clone(), "missing Authorization header".into())
        })
        .and_then(|header| {
            bearer_token(header)
                .and_then(|token| verify_token(token, &state.auth_secret))
                .map_err(|e| ApiError::from_core(request_id.0.clone(), e))
        })?;

    let settlement = state
        .settlement
        .settle(&request.room_id, &request.winner_id)
        .await
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;

    // best-effort outcome broadcast; funds are already settled
    let _ = state
        .bus
        .publish(
            &Channel::Room(request.room_id.clone()),
            &Event::GameResult {
                winner_id: settlement.winner_id.clone(),
                loser_id: settlement.loser_id.clone(),
                winner_gain: settlement.winner_gain,
                server_fee: settlement.fee,
            },
        )
        .await;

    info!(
        submitted_by = %claims.sub,
        room_id = %request.room_id,
        winner_id = %settlement.winner_id,
        "result processed"
    );

    Ok(Json(ResultResponse {
        winner_id: settlement.winner_id,
        loser_id: settlement.loser_id,
        win_amount: settlement.winner_gain,
        lose_amount: settlement.loser_gain,
        fee: settlement.fee,
    }))
}
