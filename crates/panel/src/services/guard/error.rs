//! Session guard error types.
//!
//! The guard normalizes every provider and store failure into this small
//! taxonomy at its own boundary. Display strings are deliberately generic:
//! callers may show them to users, and neither provider internals nor
//! registry membership must leak through them.

use thiserror::Error;

use super::provider::ProviderError;
use super::store::StoreError;

/// Errors returned by session guard operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider rejected the credentials or failed outright.
    /// Recoverable: the user can retry.
    #[error("authentication failed")]
    AuthFailed(#[source] ProviderError),

    /// Valid credentials, but no admin registry entry. Not retryable from
    /// the panel; only an out-of-band registry change can fix it.
    #[error("unauthorized")]
    Unauthorized,

    /// The registry lookup failed for infrastructure reasons. Treated as
    /// rejection: the guard fails closed.
    #[error("authorization service unavailable")]
    StoreUnavailable(#[source] StoreError),
}
