use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::AuthedUser;
use crate::api::rest::ActionResponse;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips/:id/start", post(start_trip))
        .route("/trips/:id/complete", post(complete_trip))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    state.trips.start(trip_id, user_id, state.deadline()).await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Trip started successfully".to_string(),
        trip_id: None,
        redirect_to: Some("/driver/live".to_string()),
    }))
}

async fn complete_trip(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    state
        .trips
        .complete(trip_id, user_id, state.deadline())
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Trip completed successfully".to_string(),
        trip_id: None,
        redirect_to: Some(format!("/trips/{trip_id}")),
    }))
}
