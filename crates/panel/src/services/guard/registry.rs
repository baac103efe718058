//! Admin registry lookups over the document store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crypted_core::{AdminRecord, SubjectId};

use super::store::{DocumentStore, Fields, Query, StoreError, StoredDocument};

/// Registry document field holding the last successful sign-in time.
const LAST_LOGIN_FIELD: &str = "lastLogin";

/// Registry document field holding the creation time.
const CREATED_AT_FIELD: &str = "createdAt";

/// The admin registry: one document per authorized subject id.
///
/// This is the single authorization routine for the whole panel - both the
/// interactive login path and the passive session listener resolve
/// identities through [`AdminRegistry::find`], so the two triggers cannot
/// drift apart.
#[derive(Debug, Clone)]
pub struct AdminRegistry<S> {
    store: Arc<S>,
    collection: String,
}

impl<S: DocumentStore> AdminRegistry<S> {
    /// Create a registry over the given store and collection name.
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Look up the registry entry for a subject id.
    ///
    /// `Ok(None)` means the subject is not staff. Store failures propagate
    /// as errors and are never folded into `None`: the caller must be able
    /// to tell "no entry" from "could not check".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable, denies the read,
    /// or holds a document this version cannot decode.
    pub async fn find(&self, uid: &SubjectId) -> Result<Option<AdminRecord>, StoreError> {
        let Some(doc) = self
            .store
            .get_document(&self.collection, uid.as_str())
            .await?
        else {
            return Ok(None);
        };

        decode_record(doc).map(Some)
    }

    /// Stamp the last-login time on an entry.
    ///
    /// Best-effort bookkeeping: callers log failures but never let them
    /// block an authorization that has already succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn touch_last_login(&self, uid: &SubjectId) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert(
            LAST_LOGIN_FIELD.to_owned(),
            Value::String(Utc::now().to_rfc3339()),
        );
        self.store
            .update_document(&self.collection, uid.as_str(), fields)
            .await
    }

    /// Create or replace a registry entry. Used by the out-of-band CLI.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be serialized or the
    /// write fails.
    pub async fn put(&self, record: &AdminRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)
            .map_err(|e| StoreError::Decode(format!("serialize admin record: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(StoreError::Decode(
                "admin record did not serialize to an object".to_owned(),
            ));
        };
        self.store
            .set_document(&self.collection, record.uid.as_str(), fields)
            .await
    }

    /// Delete a registry entry. Used by the out-of-band CLI.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    pub async fn remove(&self, uid: &SubjectId) -> Result<(), StoreError> {
        self.store
            .delete_document(&self.collection, uid.as_str())
            .await
    }

    /// List registry entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or any entry cannot be
    /// decoded.
    pub async fn list(&self, limit: u32) -> Result<Vec<AdminRecord>, StoreError> {
        let query = Query::all().order_by(CREATED_AT_FIELD, true).limit(limit);
        let docs = self.store.query_collection(&self.collection, &query).await?;
        docs.into_iter().map(decode_record).collect()
    }
}

/// Decode a registry document into an [`AdminRecord`].
///
/// The document key is authoritative for the subject id; a stray `uid`
/// field is overwritten rather than trusted.
fn decode_record(mut doc: StoredDocument) -> Result<AdminRecord, StoreError> {
    doc.fields
        .insert("uid".to_owned(), Value::String(doc.id.clone()));
    serde_json::from_value(Value::Object(doc.fields))
        .map_err(|e| StoreError::Decode(format!("admin record {}: {e}", doc.id)))
}
