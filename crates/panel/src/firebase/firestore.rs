//! Firestore REST client.
//!
//! Implements the guard's [`DocumentStore`] trait against the Firestore v1
//! REST API. Requests authenticate with the signed-in admin's id token via
//! [`FirebaseAuthClient::bearer_token`]; with no session every call is
//! denied, which is exactly the fail-closed behavior the guard wants.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::services::guard::{
    DocumentStore, Fields, FilterOp, Query, StoreError, StoredDocument,
};

use super::auth::FirebaseAuthClient;
use super::error::FirebaseError;
use super::value;

/// Firestore REST client for one project's default database.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    auth: Arc<FirebaseAuthClient>,
    /// `{base}/projects/{project}/databases/(default)/documents`
    documents_url: String,
}

impl FirestoreClient {
    /// Create a client for the given project against the given endpoint.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        auth: Arc<FirebaseAuthClient>,
        base_url: &str,
        project_id: &str,
    ) -> Self {
        Self {
            http,
            auth,
            documents_url: format!(
                "{base_url}/projects/{project_id}/databases/(default)/documents"
            ),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.documents_url)
    }

    async fn token(&self) -> Result<SecretString, StoreError> {
        self.auth.bearer_token().await.map_err(into_store_error)
    }

    /// Check a response, mapping non-success statuses to store errors.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("status {status}: {body}");
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Err(StoreError::Denied(message))
        } else {
            Err(StoreError::Transport(message))
        }
    }
}

impl DocumentStore for FirestoreClient {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.document_url(collection, id))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        decode_document(&body).map(Some)
    }

    async fn query_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let token = self.token().await?;
        let body = structured_query(collection, query);
        let response = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let response = Self::check(response).await?;
        let results: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        // runQuery streams one entry per result; entries without a document
        // key carry read metadata only.
        results
            .iter()
            .filter_map(|entry| entry.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let token = self.token().await?;
        let response = self
            .http
            .patch(self.document_url(collection, id))
            .bearer_auth(token.expose_secret())
            .json(&json!({ "fields": value::encode_fields(&fields) }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let token = self.token().await?;
        let mask: Vec<(&str, &String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key))
            .collect();
        let response = self
            .http
            .patch(self.document_url(collection, id))
            .query(&mask)
            .bearer_auth(token.expose_secret())
            .json(&json!({ "fields": value::encode_fields(&fields) }))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let token = self.token().await?;
        let response = self
            .http
            .delete(self.document_url(collection, id))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        // Deleting a missing document is not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await.map(|_| ())
    }
}

/// Map a Firebase auth error into the store taxonomy.
fn into_store_error(err: FirebaseError) -> StoreError {
    match err {
        FirebaseError::NoSession => StoreError::Denied("no active identity session".to_owned()),
        FirebaseError::Api {
            status, message, ..
        } if status == 401 || status == 403 => StoreError::Denied(message),
        other => StoreError::Transport(other.to_string()),
    }
}

/// Decode one REST document resource into a [`StoredDocument`].
fn decode_document(doc: &Value) -> Result<StoredDocument, StoreError> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("document without a name".to_owned()))?;
    let id = name
        .rsplit('/')
        .next()
        .ok_or_else(|| StoreError::Decode(format!("unparseable document name: {name}")))?
        .to_owned();

    let fields = match doc.get("fields").and_then(Value::as_object) {
        Some(fields) => value::decode_fields(fields)
            .map_err(|e| StoreError::Decode(format!("document {id}: {e}")))?,
        None => Fields::new(),
    };

    Ok(StoredDocument { id, fields })
}

/// Build the `structuredQuery` body for a collection query.
fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": collection }],
    });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": operator_name(filter.op),
                    "value": value::encode_value(&filter.value),
                }
            })
        })
        .collect();

    if let Some(object) = structured.as_object_mut() {
        match filters.len() {
            0 => {}
            1 => {
                object.insert("where".to_owned(), filters.into_iter().next().unwrap_or_default());
            }
            _ => {
                object.insert(
                    "where".to_owned(),
                    json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
                );
            }
        }

        if let Some(order) = &query.order_by {
            let direction = if order.descending {
                "DESCENDING"
            } else {
                "ASCENDING"
            };
            object.insert(
                "orderBy".to_owned(),
                json!([{ "field": { "fieldPath": order.field }, "direction": direction }]),
            );
        }

        if let Some(limit) = query.limit {
            object.insert("limit".to_owned(), json!(limit));
        }
    }

    json!({ "structuredQuery": structured })
}

/// Firestore operator name for a filter op.
const fn operator_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "EQUAL",
        FilterOp::LessThan => "LESS_THAN",
        FilterOp::LessOrEqual => "LESS_THAN_OR_EQUAL",
        FilterOp::GreaterThan => "GREATER_THAN",
        FilterOp::GreaterOrEqual => "GREATER_THAN_OR_EQUAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::Filter;

    #[test]
    fn decode_document_takes_id_from_resource_name() {
        let doc = json!({
            "name": "projects/crypted/databases/(default)/documents/admins/u1",
            "fields": { "displayName": { "stringValue": "Mod" } }
        });
        let decoded = decode_document(&doc).expect("decode");
        assert_eq!(decoded.id, "u1");
        assert_eq!(decoded.fields.get("displayName"), Some(&json!("Mod")));
    }

    #[test]
    fn decode_document_tolerates_missing_fields() {
        let doc = json!({
            "name": "projects/crypted/databases/(default)/documents/admins/u2"
        });
        let decoded = decode_document(&doc).expect("decode");
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn structured_query_with_single_filter() {
        let query = Query::all()
            .filter(Filter::equal("role", json!("moderator")))
            .limit(10);
        let body = structured_query("admins", &query);
        let structured = body.get("structuredQuery").expect("structuredQuery");
        assert_eq!(
            structured
                .get("where")
                .and_then(|w| w.get("fieldFilter"))
                .and_then(|f| f.get("op")),
            Some(&json!("EQUAL"))
        );
        assert_eq!(structured.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn structured_query_composes_multiple_filters() {
        let query = Query::all()
            .filter(Filter::equal("role", json!("admin")))
            .filter(Filter::equal("active", json!(true)));
        let body = structured_query("admins", &query);
        let composite = body
            .get("structuredQuery")
            .and_then(|s| s.get("where"))
            .and_then(|w| w.get("compositeFilter"));
        assert_eq!(composite.and_then(|c| c.get("op")), Some(&json!("AND")));
    }

    #[test]
    fn structured_query_orders_descending() {
        let query = Query::all().order_by("createdAt", true);
        let body = structured_query("admins", &query);
        let order = body
            .get("structuredQuery")
            .and_then(|s| s.get("orderBy"))
            .and_then(|o| o.get(0));
        assert_eq!(
            order.and_then(|o| o.get("direction")),
            Some(&json!("DESCENDING"))
        );
    }
}
