//! Firebase Authentication client.
//!
//! Implements the guard's [`IdentityProvider`] trait over the Identity
//! Toolkit REST API. The client owns session persistence for the process:
//! the current id token, refresh token, and expiry live here, and
//! subscribers are notified when the session ends (sign-out or a failed
//! refresh).

use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crypted_core::{Email, Identity, SubjectId};

use crate::services::guard::{IdentityProvider, ProviderError, SessionEvent};

use super::error::FirebaseError;

/// Refresh the id token when it has less than this long to live.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Identity Toolkit error codes that mean "wrong email or password".
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_PASSWORD",
    "EMAIL_NOT_FOUND",
];

/// The current provider session.
#[derive(Clone)]
struct FirebaseSession {
    identity: Identity,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Firebase Authentication client. One per process; shared behind an `Arc`.
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    api_key: SecretString,
    auth_url: String,
    token_url: String,
    session: RwLock<Option<FirebaseSession>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl std::fmt::Debug for FirebaseAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuthClient")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Successful `accounts:signInWithPassword` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Successful secure-token refresh response. Snake case, unlike the rest of
/// the Firebase surface.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Error body shared by the Firebase REST APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl FirebaseAuthClient {
    /// Create a client against the given Identity Toolkit and Secure Token
    /// endpoints.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_key: SecretString,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            session: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// A bearer token for the current session, refreshed if near expiry.
    ///
    /// A failed refresh ends the session: the stored session is cleared and
    /// subscribers are notified with `None`, exactly as if the provider had
    /// signed the user out.
    ///
    /// # Errors
    ///
    /// Returns [`FirebaseError::NoSession`] with no signed-in identity, or
    /// the refresh failure.
    pub async fn bearer_token(&self) -> Result<SecretString, FirebaseError> {
        let session = self
            .read_session()
            .clone()
            .ok_or(FirebaseError::NoSession)?;

        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if session.expires_at - Utc::now() > margin {
            return Ok(session.id_token);
        }

        match self.refresh(&session).await {
            Ok(refreshed) => {
                let token = refreshed.id_token.clone();
                *self.write_session() = Some(refreshed);
                Ok(token)
            }
            Err(err) => {
                tracing::warn!(
                    uid = %session.identity.uid,
                    error = %err,
                    "token refresh failed; ending session"
                );
                *self.write_session() = None;
                self.notify(None);
                Err(err)
            }
        }
    }

    /// Exchange the refresh token for a fresh id token.
    async fn refresh(&self, session: &FirebaseSession) -> Result<FirebaseSession, FirebaseError> {
        let url = format!("{}/token", self.token_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error("securetoken", status.as_u16(), response).await);
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| FirebaseError::Decode(format!("refresh response: {e}")))?;

        Ok(FirebaseSession {
            identity: session.identity.clone(),
            id_token: SecretString::from(body.id_token),
            refresh_token: SecretString::from(body.refresh_token),
            expires_at: expiry_from(&body.expires_in)?,
        })
    }

    /// Deliver an event to every live subscriber.
    fn notify(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Option<FirebaseSession>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Option<FirebaseSession>> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityProvider for FirebaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let url = format!("{}/accounts:signInWithPassword", self.auth_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err = api_error("identitytoolkit", status.as_u16(), response).await;
            return Err(classify_sign_in_error(&err));
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Rejected(format!("malformed sign-in response: {e}")))?;

        let identity = Identity::new(
            SubjectId::new(body.local_id),
            Email::parse(&body.email)
                .map_err(|e| ProviderError::Rejected(format!("provider returned bad email: {e}")))?,
        );

        let expires_at = expiry_from(&body.expires_in)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;

        *self.write_session() = Some(FirebaseSession {
            identity: identity.clone(),
            id_token: SecretString::from(body.id_token),
            refresh_token: SecretString::from(body.refresh_token),
            expires_at,
        });

        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let had_session = self.write_session().take().is_some();
        if had_session {
            self.notify(None);
        }
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = self.read_session().as_ref().map(|s| s.identity.clone());
        // The subscriber always learns the starting state first.
        let _ = tx.send(current);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

/// Build an API error from a non-success response, preserving the service
/// error code when the body carries one.
async fn api_error(service: &'static str, status: u16, response: reqwest::Response) -> FirebaseError {
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => format!("status {status}"),
    };
    FirebaseError::Api {
        service,
        status,
        message,
    }
}

/// Map an Identity Toolkit error to the provider taxonomy. Credential
/// errors are deliberately indistinct from one another.
fn classify_sign_in_error(err: &FirebaseError) -> ProviderError {
    if let FirebaseError::Api { message, .. } = err {
        if CREDENTIAL_ERROR_CODES
            .iter()
            .any(|code| message.starts_with(code))
        {
            return ProviderError::InvalidCredentials;
        }
        return ProviderError::Rejected(message.clone());
    }
    ProviderError::Unavailable(err.to_string())
}

/// Absolute expiry from an `expiresIn` seconds string.
fn expiry_from(expires_in: &str) -> Result<DateTime<Utc>, FirebaseError> {
    let seconds: i64 = expires_in
        .parse()
        .map_err(|_| FirebaseError::Decode(format!("expiresIn: {expires_in}")))?;
    Ok(Utc::now() + Duration::seconds(seconds))
}
