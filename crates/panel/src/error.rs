//! Unified error handling for the panel.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::guard::AuthError;

/// Application-level error type for the panel's HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// Session guard rejected the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Report server-side failures to Sentry
        if matches!(
            self,
            Self::Internal(_) | Self::Auth(AuthError::StoreUnavailable(_))
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Panel request error"
            );
        }

        let status = match &self {
            Self::Auth(AuthError::AuthFailed(_)) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::Unauthorized) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients. AuthError's Display
        // is already scrubbed of provider and registry detail.
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context from the signed-in admin.
pub fn set_sentry_user(uid: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(uid.to_owned()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::{ProviderError, StoreError};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn auth_failures_map_to_401() {
        assert_eq!(
            status_of(AppError::Auth(AuthError::AuthFailed(
                ProviderError::InvalidCredentials
            ))),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn unauthorized_maps_to_403() {
        assert_eq!(
            status_of(AppError::Auth(AuthError::Unauthorized)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_outage_maps_to_503() {
        assert_eq!(
            status_of(AppError::Auth(AuthError::StoreUnavailable(
                StoreError::Transport("connection refused".to_owned())
            ))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn bad_request_and_not_found() {
        assert_eq!(
            status_of(AppError::BadRequest("bad".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("x".to_owned())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = AppError::Internal("firestore url misconfigured".to_owned());
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
        // Display still carries detail for logs
        let err = AppError::Internal("firestore url misconfigured".to_owned());
        assert!(err.to_string().contains("firestore url"));
    }
}
