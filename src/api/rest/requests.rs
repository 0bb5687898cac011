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
        .route("/requests/:id/onboard", post(mark_onboard))
        .route("/requests/:id/dropoff", post(mark_dropoff))
}

async fn mark_onboard(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let trip_id = state
        .requests
        .mark_onboard(request_id, user_id, state.deadline())
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "You are now onboard.".to_string(),
        trip_id: Some(trip_id),
        redirect_to: None,
    }))
}

async fn mark_dropoff(
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let trip_id = state
        .requests
        .mark_dropped_off(request_id, user_id, state.deadline())
        .await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "You are now dropped off.".to_string(),
        trip_id: None,
        redirect_to: Some(format!("/trips/{trip_id}")),
    }))
}
