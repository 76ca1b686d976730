use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects requests whose `Authorization: Bearer <key>` does not match
/// `CONTROL_PLANE_API_KEY`.
pub async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match validate_request(&state, &req) {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

fn validate_request(state: &AppState, req: &Request) -> Result<(), ApiError> {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if token != state.config.control_plane_api_key {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
