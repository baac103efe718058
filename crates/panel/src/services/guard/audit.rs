//! Audit log entries for authentication events.
//!
//! Every login outcome and logout is appended to the audit collection so
//! operators can reconstruct who held panel access and when. Writes are
//! best-effort: the guard logs failures and moves on, since an audit outage
//! must never lock staff out (or, worse, keep a rejected session alive).

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crypted_core::{AuditEntryId, Email, SubjectId};

use super::store::{DocumentStore, StoreError};

/// What happened, from the guard's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Credentials accepted and a registry entry found.
    LoginSucceeded,
    /// Credentials accepted but no registry entry; session revoked.
    LoginRejected,
    /// Session ended at the user's request.
    LoggedOut,
}

/// One audit log document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditEntry<'a> {
    action: AuditAction,
    uid: &'a SubjectId,
    email: &'a Email,
    at: String,
}

/// Appender for the audit log collection.
#[derive(Debug, Clone)]
pub struct AuditLog<S> {
    store: Arc<S>,
    collection: String,
}

impl<S: DocumentStore> AuditLog<S> {
    /// Create an audit log over the given store and collection name.
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails. Callers treat this as
    /// diagnostic, not fatal.
    pub async fn append(
        &self,
        action: AuditAction,
        uid: &SubjectId,
        email: &Email,
    ) -> Result<(), StoreError> {
        let entry = AuditEntry {
            action,
            uid,
            email,
            at: Utc::now().to_rfc3339(),
        };
        let value = serde_json::to_value(&entry)
            .map_err(|e| StoreError::Decode(format!("serialize audit entry: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(StoreError::Decode(
                "audit entry did not serialize to an object".to_owned(),
            ));
        };

        let id = AuditEntryId::new(Uuid::new_v4().to_string());
        self.store
            .set_document(&self.collection, id.as_str(), fields)
            .await
    }
}
