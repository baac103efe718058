//! The session guard.
//!
//! Bridges the identity provider's sign-in/sign-out events to an
//! authorization-checked session the rest of the panel can trust. The guard
//! owns the single [`SessionState`] cell; every other component only reads
//! it (via [`SessionGuard::current_state`] or a [`SessionGuard::subscribe`]
//! receiver) and acts on the terminal states.
//!
//! # Invariants
//!
//! - Protected content is only served while the state is `Authorized`.
//! - An identity with no admin registry entry is signed back out before the
//!   guard settles into `Rejected`.
//! - The guard fails closed: a registry outage is a rejection, never an
//!   authorization.
//!
//! # Ordering
//!
//! Provider notifications are processed in arrival order, but a lookup for
//! notification N may still be in flight when N+1 arrives. Only the latest
//! identity matters, so every transition carries a generation number and a
//! stale generation's result is dropped instead of applied.

pub mod audit;
pub mod error;
pub mod provider;
pub mod registry;
pub mod state;
pub mod store;

pub use audit::{AuditAction, AuditLog};
pub use error::AuthError;
pub use provider::{IdentityProvider, ProviderError, SessionEvent};
pub use registry::AdminRegistry;
pub use state::SessionState;
pub use store::{DocumentStore, Fields, Filter, FilterOp, OrderBy, Query, StoreError, StoredDocument};

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crypted_core::{AdminRecord, Identity};

/// Collection names the guard reads and writes.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Collection holding one [`AdminRecord`] document per subject id.
    pub registry_collection: String,
    /// Collection receiving audit entries.
    pub audit_collection: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            registry_collection: "admins".to_owned(),
            audit_collection: "auditLogs".to_owned(),
        }
    }
}

/// The session guard. One instance per process; runs for the process
/// lifetime with no terminal state.
///
/// Construct with [`SessionGuard::new`], then spawn [`SessionGuard::run`] on
/// the runtime so the passive subscription is serviced.
pub struct SessionGuard<P, S> {
    provider: Arc<P>,
    registry: AdminRegistry<S>,
    audit: AuditLog<S>,
    state: watch::Sender<SessionState>,
    /// Generation of the newest accepted transition. Guards every settle so
    /// a superseded lookup can never overwrite a newer outcome.
    latest: Mutex<u64>,
}

impl<P, S> SessionGuard<P, S>
where
    P: IdentityProvider,
    S: DocumentStore,
{
    /// Create a guard over the given provider and store.
    ///
    /// The initial state is `Resolving`: the guard must hear from the
    /// provider (via [`SessionGuard::run`]) whether a persisted session
    /// exists before it can claim `Unauthenticated`.
    pub fn new(provider: Arc<P>, store: Arc<S>, config: GuardConfig) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            provider,
            registry: AdminRegistry::new(Arc::clone(&store), config.registry_collection),
            audit: AuditLog::new(store, config.audit_collection),
            state,
            latest: Mutex::new(0),
        }
    }

    /// The latest settled (or in-progress) state.
    #[must_use]
    pub fn current_state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state transitions. Receivers see every settled state
    /// change (coalesced under load to the newest value, which is the only
    /// one route guards act on).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The registry this guard authorizes against.
    #[must_use]
    pub const fn registry(&self) -> &AdminRegistry<S> {
        &self.registry
    }

    /// Interactive login: establish a provider session, then authorize it
    /// against the registry.
    ///
    /// Exactly one provider session is active after this returns `Ok`; zero
    /// after it returns an error.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthFailed`] - the provider rejected the credentials
    ///   or could not be reached; no session was established.
    /// - [`AuthError::Unauthorized`] - credentials were valid but no
    ///   registry entry exists; the session has been revoked.
    /// - [`AuthError::StoreUnavailable`] - the registry could not be
    ///   checked; the session has been revoked (fail closed).
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminRecord, AuthError> {
        let identity = match self.provider.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(error = %err, "provider sign-in failed");
                return Err(AuthError::AuthFailed(err));
            }
        };

        let generation = self.transition(SessionState::Resolving {
            identity: Some(identity.clone()),
        });

        match self.resolve(&identity).await {
            Ok(record) => {
                if let Err(err) = self.registry.touch_last_login(&identity.uid).await {
                    tracing::warn!(uid = %identity.uid, error = %err, "failed to stamp last login");
                }
                if let Err(err) = self
                    .audit
                    .append(AuditAction::LoginSucceeded, &identity.uid, &identity.email)
                    .await
                {
                    tracing::warn!(uid = %identity.uid, error = %err, "failed to write audit entry");
                }
                self.settle(
                    generation,
                    SessionState::Authorized {
                        identity: identity.clone(),
                        record: record.clone(),
                    },
                );
                tracing::info!(uid = %identity.uid, role = %record.role, "admin logged in");
                Ok(record)
            }
            Err(err) => {
                self.settle(generation, SessionState::Rejected);
                // The audit write authenticates with the session that is
                // about to be revoked, so it must land first.
                if matches!(err, AuthError::Unauthorized) {
                    if let Err(audit_err) = self
                        .audit
                        .append(AuditAction::LoginRejected, &identity.uid, &identity.email)
                        .await
                    {
                        tracing::warn!(uid = %identity.uid, error = %audit_err, "failed to write audit entry");
                    }
                }
                // This call created the session; it must not survive the
                // rejection regardless of who has transitioned since.
                self.force_sign_out().await;
                tracing::warn!(uid = %identity.uid, error = ?err, "login rejected");
                Err(err)
            }
        }
    }

    /// End the current session and settle `Unauthenticated`.
    ///
    /// Idempotent: logging out with no active session succeeds. Local state
    /// is cleared even if the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthFailed`] if the provider sign-out call
    /// failed; the observable state is `Unauthenticated` regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let prior = self.current_state();

        // Audit while the session credential is still valid; the store
        // denies the write once the provider session is gone.
        if let SessionState::Authorized { identity, .. } = &prior {
            if let Err(err) = self
                .audit
                .append(AuditAction::LoggedOut, &identity.uid, &identity.email)
                .await
            {
                tracing::warn!(uid = %identity.uid, error = %err, "failed to write audit entry");
            }
        }

        let result = self.provider.sign_out().await;
        self.transition(SessionState::Unauthenticated);

        if let SessionState::Authorized { identity, .. } = prior {
            tracing::info!(uid = %identity.uid, "admin logged out");
        }

        result.map_err(|err| {
            tracing::warn!(error = %err, "provider sign-out failed; local state cleared anyway");
            AuthError::AuthFailed(err)
        })
    }

    /// Service the provider's session-change notifications.
    ///
    /// Subscribes once and runs until the provider's event stream closes
    /// (process shutdown). A notification arriving while a lookup is in
    /// flight supersedes it: the stale lookup is abandoned and its result
    /// never applied.
    pub async fn run(self: Arc<Self>) {
        let mut events = self.provider.subscribe();
        let mut pending: Option<SessionEvent> = None;

        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => match events.recv().await {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                None => {
                    self.transition(SessionState::Unauthenticated);
                    tracing::debug!("provider session ended");
                }
                Some(identity) => {
                    let generation = self.transition(SessionState::Resolving {
                        identity: Some(identity.clone()),
                    });

                    tokio::select! {
                        next = events.recv() => match next {
                            Some(event) => {
                                tracing::debug!(uid = %identity.uid, "session resolution superseded");
                                pending = Some(event);
                            }
                            None => break,
                        },
                        outcome = self.resolve(&identity) => match outcome {
                            Ok(record) => {
                                if self.settle(
                                    generation,
                                    SessionState::Authorized {
                                        identity: identity.clone(),
                                        record,
                                    },
                                ) {
                                    tracing::info!(uid = %identity.uid, "session authorized");
                                }
                            }
                            Err(err) => {
                                if self.settle(generation, SessionState::Rejected) {
                                    tracing::warn!(
                                        uid = %identity.uid,
                                        error = ?err,
                                        "session rejected; revoking provider session"
                                    );
                                    // Audit first: the write authenticates
                                    // with the session being revoked.
                                    if matches!(err, AuthError::Unauthorized) {
                                        if let Err(audit_err) = self
                                            .audit
                                            .append(
                                                AuditAction::LoginRejected,
                                                &identity.uid,
                                                &identity.email,
                                            )
                                            .await
                                        {
                                            tracing::warn!(
                                                uid = %identity.uid,
                                                error = %audit_err,
                                                "failed to write audit entry"
                                            );
                                        }
                                    }
                                    self.force_sign_out().await;
                                }
                            }
                        },
                    }
                }
            }
        }

        tracing::debug!("session event stream closed; guard listener exiting");
    }

    /// The one authorization routine, shared by `login` and the passive
    /// listener so the two triggers cannot diverge.
    async fn resolve(&self, identity: &Identity) -> Result<AdminRecord, AuthError> {
        match self.registry.find(&identity.uid).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AuthError::Unauthorized),
            Err(err) => {
                tracing::error!(uid = %identity.uid, error = %err, "registry lookup failed; failing closed");
                Err(AuthError::StoreUnavailable(err))
            }
        }
    }

    /// Revoke the provider session after a rejection. The rejection stands
    /// even if revocation fails; the failure is logged for operators.
    async fn force_sign_out(&self) {
        if let Err(err) = self.provider.sign_out().await {
            tracing::error!(error = %err, "failed to revoke provider session after rejection");
        }
    }

    /// Accept a new transition: bump the generation and publish the state.
    fn transition(&self, next: SessionState) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        self.state.send_replace(next);
        *latest
    }

    /// Publish the outcome of the transition that began at `generation`,
    /// unless a newer transition has been accepted since. Returns whether
    /// the outcome was applied.
    fn settle(&self, generation: u64, next: SessionState) -> bool {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest != generation {
            return false;
        }
        self.state.send_replace(next);
        true
    }
}
