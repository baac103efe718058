//! Firebase API error type.

use thiserror::Error;

/// Errors from the Firebase REST APIs (Identity Toolkit, Secure Token,
/// Firestore).
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{service} returned {status}: {message}")]
    Api {
        /// Which Firebase service answered.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, or the raw body.
        message: String,
    },

    /// The API answered 2xx but the body was not the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// A Firestore call was attempted with no signed-in identity.
    #[error("no active identity session")]
    NoSession,
}

impl FirebaseError {
    /// The HTTP status of an API-level error, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
