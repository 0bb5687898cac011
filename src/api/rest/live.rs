use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::api::rest::auth::AuthedUser;
use crate::error::AppError;
use crate::models::view::LiveTripView;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/live/trips/:id", get(live_trip_view))
        .route("/live/driver/current", get(current_driver_trip))
}

#[derive(Serialize)]
struct TripViewResponse {
    success: bool,
    trip: LiveTripView,
}

async fn live_trip_view(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<TripViewResponse>, AppError> {
    let deadline = state.deadline();

    let is_driver = state
        .store
        .is_driver_for_trip(trip_id, user_id, &deadline)
        .await;
    let is_rider = state
        .store
        .is_rider_for_trip(trip_id, user_id, &deadline)
        .await;
    if !is_driver && !is_rider {
        return Err(AppError::NotOwner);
    }

    let trip = state.store.live_trip_view(trip_id, user_id, &deadline).await?;
    Ok(Json(TripViewResponse {
        success: true,
        trip,
    }))
}

async fn current_driver_trip(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
) -> Result<Json<TripViewResponse>, AppError> {
    let deadline = state.deadline();
    let trip = state
        .store
        .current_driver_live_trip(user_id, &deadline)
        .await?;

    Ok(Json(TripViewResponse {
        success: true,
        trip,
    }))
}
