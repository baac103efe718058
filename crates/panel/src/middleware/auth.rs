//! Authentication extractors for panel route handlers.
//!
//! Every protected handler takes [`RequireAdminAuth`] as an argument, which
//! reads the guard's current state. No per-request token validation happens
//! here: the guard has already settled authorization, and handlers only act
//! on the terminal states.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crypted_core::AdminRecord;

use crate::services::guard::SessionState;
use crate::state::AppState;

/// Extractor that requires an authorized admin session.
///
/// Rejects with 401 when no session is authorized, and 503 while a session
/// is still resolving (the client should retry, not re-authenticate).
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.display_name)
/// }
/// ```
pub struct RequireAdminAuth(pub AdminRecord);

/// Error returned when admin authorization is required but absent.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthRejection {
    /// No authorized session.
    Unauthorized,
    /// Authorization is still being determined; retry shortly.
    Resolving,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "authentication required" })),
            )
                .into_response(),
            Self::Resolving => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "session is being verified; retry shortly" })),
            )
                .into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdminAuth {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.guard().current_state() {
            SessionState::Authorized { record, .. } => Ok(Self(record)),
            SessionState::Resolving { .. } => Err(AdminAuthRejection::Resolving),
            SessionState::Unauthenticated | SessionState::Rejected => {
                Err(AdminAuthRejection::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_rejection_is_401() {
        let response = AdminAuthRejection::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn resolving_rejection_is_503() {
        let response = AdminAuthRejection::Resolving.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
