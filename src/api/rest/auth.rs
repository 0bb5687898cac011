use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Caller identity as verified by the upstream auth layer, which injects
/// it on every request as the `x-user-id` header. Token verification
/// itself is outside this service.
pub struct AuthedUser(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let user_id = raw.parse::<Uuid>().map_err(|_| AppError::Unauthorized)?;
        Ok(AuthedUser(user_id))
    }
}
