//! Authentication routes.
//!
//! - `POST /auth/login` - interactive login
//! - `POST /auth/logout` - end the session
//! - `GET /auth/session` - current session state, for the SPA shell
//! - `GET /api/me` - the signed-in admin's registry record

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crypted_core::{AdminRecord, Email};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAdminAuth;
use crate::services::guard::SessionState;
use crate::state::AppState;

/// Authentication route tree.
pub fn routes() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
        .route("/api/me", get(me))
}

/// Login request body.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Handle login: sign in with the identity provider, authorize against the
/// registry, and return the admin record on success.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AdminRecord>, AppError> {
    // Reject obviously malformed input before touching the provider.
    let email = Email::parse(&body.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    if body.password.is_empty() {
        return Err(AppError::BadRequest("password must not be empty".to_owned()));
    }

    let record = state.guard().login(email.as_str(), &body.password).await?;
    set_sentry_user(record.uid.as_str(), Some(record.email.as_str()));
    Ok(Json(record))
}

/// Handle logout. Idempotent: always ends 204 unless the provider call
/// itself failed.
async fn logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.guard().logout().await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Report the current session state. Not a protected route: the SPA shell
/// polls this to decide which screen to render.
async fn session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.guard().current_state())
}

/// The signed-in admin's registry record.
async fn me(RequireAdminAuth(record): RequireAdminAuth) -> Json<AdminRecord> {
    Json(record)
}
