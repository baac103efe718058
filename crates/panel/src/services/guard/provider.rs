//! Identity provider interface consumed by the session guard.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use crypted_core::Identity;

/// One session-change notification: the now-current identity, or `None`
/// when the session ended.
pub type SessionEvent = Option<Identity>;

/// Errors that can occur talking to the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the supplied credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The provider refused the request for another reason (disabled
    /// account, quota, malformed response).
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("provider unreachable: {0}")]
    Unavailable(String),
}

/// External authentication service issuing and tracking user sessions.
///
/// Implementations own session persistence entirely. The guard never stores
/// credentials or tokens; it only asks the provider to establish or clear a
/// session and listens for the resulting changes.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Establish a session for the given credentials.
    ///
    /// On success exactly one session is active. A successful `sign_in` does
    /// not emit a session event: the caller drives authorization itself, and
    /// events are reserved for changes the caller did not initiate (startup
    /// restore, expiry, sign-out).
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, ProviderError>> + Send;

    /// End the current session, notifying subscribers with `None`.
    ///
    /// Idempotent: signing out with no active session succeeds.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Subscribe to session-change notifications.
    ///
    /// The current session (possibly `None`) is delivered as the first
    /// event, so a fresh subscriber always learns the starting state.
    /// Events arrive in the order sessions change.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent>;
}
