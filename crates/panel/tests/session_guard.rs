//! End-to-end session guard behavior over in-memory fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crypted_core::{AdminRecord, AdminRole, Email, Identity, PermissionSet, SubjectId};
use crypted_panel::services::guard::{
    AuthError, DocumentStore, Fields, GuardConfig, IdentityProvider, ProviderError, Query,
    SessionEvent, SessionGuard, SessionState, StoreError, StoredDocument,
};

// =============================================================================
// Fakes
// =============================================================================

/// The provider's session cell, shared with the store so the store can
/// authenticate calls against it the way the production client does.
type SessionCell = Arc<Mutex<Option<Identity>>>;

fn read_cell(cell: &SessionCell) -> Option<Identity> {
    cell.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// In-memory identity provider with scripted accounts.
struct MockProvider {
    /// email -> (password, identity)
    accounts: HashMap<String, (String, Identity)>,
    session: SessionCell,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            session: Arc::new(Mutex::new(None)),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn with_account(mut self, email: &str, password: &str, uid: &str) -> Self {
        let identity = identity(uid, email);
        self.accounts
            .insert(email.to_owned(), (password.to_owned(), identity));
        self
    }

    /// Pretend a persisted session already exists at startup.
    fn with_session(self, uid: &str, email: &str) -> Self {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(identity(uid, email));
        self
    }

    fn session_cell(&self) -> SessionCell {
        Arc::clone(&self.session)
    }

    /// Simulate a provider-initiated session change (restore, expiry).
    fn emit(&self, event: SessionEvent) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = event.clone();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn has_active_session(&self) -> bool {
        read_cell(&self.session).is_some()
    }
}

impl IdentityProvider for MockProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let Some((expected, identity)) = self.accounts.get(email) else {
            return Err(ProviderError::InvalidCredentials);
        };
        if expected != password {
            return Err(ProviderError::InvalidCredentials);
        }
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(identity.clone())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let had_session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if had_session {
            self.subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| tx.send(None).is_ok());
        }
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(read_cell(&self.session));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

/// In-memory document store with injectable latency and outages.
///
/// Like the production store client, every call authenticates with the
/// provider's session: with no signed-in identity, reads and writes are
/// denied.
struct MockStore {
    docs: Mutex<HashMap<(String, String), Fields>>,
    /// Per-document-id artificial read latency.
    read_delays: Mutex<HashMap<String, Duration>>,
    fail_reads: AtomicBool,
    session: SessionCell,
}

impl MockStore {
    fn new(session: SessionCell) -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            read_delays: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            session,
        }
    }

    fn seed_admin(&self, record: &AdminRecord) {
        let Value::Object(fields) = serde_json::to_value(record).expect("serialize record")
        else {
            panic!("record must serialize to an object");
        };
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(("admins".to_owned(), record.uid.as_str().to_owned()), fields);
    }

    fn delay_reads_for(&self, id: &str, delay: Duration) {
        self.read_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_owned(), delay);
    }

    fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn count_in(&self, collection: &str) -> usize {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    fn check_session(&self) -> Result<(), StoreError> {
        if read_cell(&self.session).is_some() {
            Ok(())
        } else {
            Err(StoreError::Denied("no active identity session".to_owned()))
        }
    }
}

impl DocumentStore for MockStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let delay = self
            .read_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("injected outage".to_owned()));
        }
        self.check_session()?;
        let fields = self
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_owned(), id.to_owned()))
            .cloned();
        Ok(fields.map(|fields| StoredDocument {
            id: id.to_owned(),
            fields,
        }))
    }

    async fn query_collection(
        &self,
        collection: &str,
        _query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("injected outage".to_owned()));
        }
        self.check_session()?;
        let docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), fields)| StoredDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check_session()?;
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_owned(), id.to_owned()), fields);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check_session()?;
        let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = docs
            .entry((collection.to_owned(), id.to_owned()))
            .or_default();
        for (key, value) in fields {
            entry.insert(key, value);
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_session()?;
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(collection.to_owned(), id.to_owned()));
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn identity(uid: &str, email: &str) -> Identity {
    Identity::new(SubjectId::new(uid), Email::parse(email).expect("valid email"))
}

fn admin_record(uid: &str, email: &str) -> AdminRecord {
    AdminRecord {
        uid: SubjectId::new(uid),
        email: Email::parse(email).expect("valid email"),
        display_name: "Test Admin".to_owned(),
        role: AdminRole::Moderator,
        permissions: PermissionSet::named(["reports"]),
        created_at: "2026-01-10T12:00:00Z".parse().expect("timestamp"),
        last_login: None,
    }
}

type TestGuard = SessionGuard<MockProvider, MockStore>;

fn guard_over(
    provider: MockProvider,
    store: MockStore,
) -> (Arc<TestGuard>, Arc<MockProvider>, Arc<MockStore>) {
    let provider = Arc::new(provider);
    let store = Arc::new(store);
    let guard = Arc::new(SessionGuard::new(
        Arc::clone(&provider),
        Arc::clone(&store),
        GuardConfig::default(),
    ));
    (guard, provider, store)
}

/// Wait for a state matching the predicate, with a test-failure timeout.
async fn wait_for(
    rx: &mut watch::Receiver<SessionState>,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("guard dropped")
        .clone()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn starts_resolving_then_settles_unauthenticated_without_a_session() {
    let provider = MockProvider::new();
    let store = MockStore::new(provider.session_cell());
    let (guard, _provider, _store) = guard_over(provider, store);
    assert!(guard.current_state().is_resolving());

    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());

    let state = wait_for(&mut rx, |s| !s.is_resolving()).await;
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn startup_restores_and_authorizes_a_persisted_session() {
    let provider = MockProvider::new().with_session("u1", "mod@crypted.app");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, _provider, _store) = guard_over(provider, store);

    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());

    let state = wait_for(&mut rx, SessionState::is_authorized).await;
    assert_eq!(state.record().map(|r| r.uid.as_str()), Some("u1"));
}

#[tokio::test]
async fn passive_restore_does_not_rewrite_sign_in_history() {
    // Restoring a persisted session is session continuation, not a new
    // sign-in: no lastLogin stamp, no audit entry.
    let provider = MockProvider::new().with_session("u1", "mod@crypted.app");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, _provider, store) = guard_over(provider, store);

    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, SessionState::is_authorized).await;

    assert_eq!(store.count_in("auditLogs"), 0);
    let record = guard
        .registry()
        .find(&SubjectId::new("u1"))
        .await
        .expect("lookup")
        .expect("entry exists");
    assert!(record.last_login.is_none());
}

#[tokio::test]
async fn login_with_registry_entry_authorizes() {
    let provider = MockProvider::new().with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, provider, store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    let record = guard
        .login("mod@crypted.app", "hunter2")
        .await
        .expect("login succeeds");
    assert_eq!(record.uid.as_str(), "u1");
    assert_eq!(record.role, AdminRole::Moderator);
    assert!(guard.current_state().is_authorized());
    assert!(provider.has_active_session());

    // Success leaves an audit trail and a lastLogin stamp.
    assert_eq!(store.count_in("auditLogs"), 1);
    let stamped = guard
        .registry()
        .find(&SubjectId::new("u1"))
        .await
        .expect("lookup")
        .expect("entry exists");
    assert!(stamped.last_login.is_some());
}

#[tokio::test]
async fn login_with_bad_credentials_fails_without_a_session() {
    let provider = MockProvider::new().with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    let (guard, provider, _store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    let err = guard
        .login("mod@crypted.app", "wrong")
        .await
        .expect_err("login must fail");
    assert!(matches!(err, AuthError::AuthFailed(_)));
    assert_eq!(guard.current_state(), SessionState::Unauthenticated);
    assert!(!provider.has_active_session());
}

#[tokio::test]
async fn login_without_registry_entry_is_rejected_and_signed_out() {
    // Valid provider account, but nobody granted panel access.
    let provider = MockProvider::new().with_account("user@crypted.app", "hunter2", "u7");
    let store = MockStore::new(provider.session_cell());
    let (guard, provider, store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    let err = guard
        .login("user@crypted.app", "hunter2")
        .await
        .expect_err("login must be rejected");
    assert!(matches!(err, AuthError::Unauthorized));

    // The forced sign-out propagates back through the provider event, so
    // the guard ends up plain unauthenticated with zero live sessions.
    let state = wait_for(&mut rx, |s| *s == SessionState::Unauthenticated).await;
    assert_eq!(state, SessionState::Unauthenticated);
    assert!(!provider.has_active_session());
    // The audit write authenticated with the session, so it must have
    // landed before the revocation.
    assert_eq!(store.count_in("auditLogs"), 1);
}

#[tokio::test]
async fn audit_entries_land_before_the_session_is_revoked() {
    // The store denies writes once the provider session is gone, exactly
    // like production. Both the rejected-login entry and the logout entry
    // only exist if the guard audits before revoking.
    let provider = MockProvider::new()
        .with_account("ghost@crypted.app", "hunter2", "u7")
        .with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, _provider, store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    guard
        .login("ghost@crypted.app", "hunter2")
        .await
        .expect_err("unregistered login must be rejected");
    wait_for(&mut rx, |s| *s == SessionState::Unauthenticated).await;
    assert_eq!(store.count_in("auditLogs"), 1);

    guard
        .login("mod@crypted.app", "hunter2")
        .await
        .expect("login succeeds");
    guard.logout().await.expect("logout succeeds");
    assert_eq!(store.count_in("auditLogs"), 3);
}

#[tokio::test]
async fn registry_outage_fails_closed() {
    let provider = MockProvider::new().with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    store.set_fail_reads(true);
    let (guard, provider, _store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    let err = guard
        .login("mod@crypted.app", "hunter2")
        .await
        .expect_err("login must fail closed");
    assert!(matches!(err, AuthError::StoreUnavailable(_)));

    wait_for(&mut rx, |s| *s == SessionState::Unauthenticated).await;
    assert!(!provider.has_active_session());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let provider = MockProvider::new().with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, provider, store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    guard
        .login("mod@crypted.app", "hunter2")
        .await
        .expect("login succeeds");
    guard.logout().await.expect("logout succeeds");
    assert_eq!(guard.current_state(), SessionState::Unauthenticated);
    assert!(!provider.has_active_session());

    // A second logout with no session is still fine.
    guard.logout().await.expect("logout is idempotent");
    assert_eq!(guard.current_state(), SessionState::Unauthenticated);

    // login_succeeded + logged_out; the second logout audits nothing.
    assert_eq!(store.count_in("auditLogs"), 2);
}

#[tokio::test]
async fn provider_session_expiry_clears_authorization() {
    let provider = MockProvider::new().with_account("mod@crypted.app", "hunter2", "u1");
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "mod@crypted.app"));
    let (guard, provider, _store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| !s.is_resolving()).await;

    guard
        .login("mod@crypted.app", "hunter2")
        .await
        .expect("login succeeds");
    wait_for(&mut rx, SessionState::is_authorized).await;

    // Token refresh failed upstream: the provider reports the session gone.
    provider.emit(None);
    let state = wait_for(&mut rx, |s| !s.is_authorized()).await;
    assert_eq!(state, SessionState::Unauthenticated);
}

#[tokio::test]
async fn session_event_without_registry_entry_revokes_the_session() {
    // A persisted session is restored at startup for a revoked admin.
    let provider = MockProvider::new().with_session("u9", "former@crypted.app");
    let store = MockStore::new(provider.session_cell());
    let (guard, provider, _store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());

    // Rejection revokes the session; the resulting provider event settles
    // the guard into plain unauthenticated.
    let state = wait_for(&mut rx, |s| *s == SessionState::Unauthenticated).await;
    assert_eq!(state, SessionState::Unauthenticated);
    assert!(!provider.has_active_session());
}

#[tokio::test(start_paused = true)]
async fn newer_session_event_supersedes_an_in_flight_lookup() {
    let provider = MockProvider::new();
    let store = MockStore::new(provider.session_cell());
    store.seed_admin(&admin_record("u1", "first@crypted.app"));
    store.seed_admin(&admin_record("u2", "second@crypted.app"));
    // u1's lookup hangs; u2's completes immediately.
    store.delay_reads_for("u1", Duration::from_secs(60));
    let (guard, provider, _store) = guard_over(provider, store);
    let mut rx = guard.subscribe();
    tokio::spawn(Arc::clone(&guard).run());
    wait_for(&mut rx, |s| *s == SessionState::Unauthenticated).await;

    // Two rapid-fire session changes: the second must win even though the
    // first lookup is still in flight.
    provider.emit(Some(identity("u1", "first@crypted.app")));
    provider.emit(Some(identity("u2", "second@crypted.app")));

    let state = wait_for(&mut rx, SessionState::is_authorized).await;
    assert_eq!(state.record().map(|r| r.uid.as_str()), Some("u2"));

    // The stale lookup never lands, even after its delay elapses.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(
        guard.current_state().record().map(|r| r.uid.as_str()),
        Some("u2")
    );
}
