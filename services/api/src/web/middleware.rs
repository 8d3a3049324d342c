//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting the schedule-mutating and
//! review routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Middleware that validates the `x-admin-token` header through the
/// `AuthValidator` port.
///
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the token header
    let token = req
        .headers()
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Validate through the auth port
    state.auth.validate_admin(token).await.map_err(|e| {
        error!("Admin auth failed: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    // 3. Continue to the handler
    Ok(next.run(req).await)
}
