//! Panel route handlers.

pub mod auth;

use axum::Router;

use crate::state::AppState;

/// Build the panel's route tree.
pub fn routes() -> Router<AppState> {
    Router::new().merge(auth::routes())
}
