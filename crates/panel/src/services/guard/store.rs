//! Document store interface consumed by the session guard.
//!
//! The business data (users, chats, stories, calls, reports, the admin
//! registry, the audit log) lives in an external schemaless store. The guard
//! only needs a narrow slice of it: keyed document reads and writes plus
//! filtered collection queries. This trait is that slice; the Firestore
//! client implements it for production and tests supply in-memory fakes.
//!
//! "No such document" and "the query failed" are deliberately distinct
//! outcomes (`Ok(None)` vs `Err`). Coercing store failures into empty
//! results would fail open in the authorization path.

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;

/// Plain-JSON field map of a stored document.
pub type Fields = Map<String, Value>;

/// Errors that can occur talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or answered with a server error.
    #[error("store unreachable: {0}")]
    Transport(String),

    /// The store rejected the caller's credentials.
    #[error("store denied the request: {0}")]
    Denied(String),

    /// A document exists but could not be interpreted.
    #[error("malformed document: {0}")]
    Decode(String),
}

/// A document read from the store, with its key and decoded fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document id within its collection.
    pub id: String,
    /// Field values as plain JSON.
    pub fields: Fields,
}

/// Comparison operator for a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

/// A single field filter.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field path the filter applies to.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Value to compare against.
    pub value: Value,
}

impl Filter {
    /// Equality filter on a field.
    #[must_use]
    pub fn equal(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equal,
            value,
        }
    }
}

/// Result ordering for a collection query.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// Field path to order by.
    pub field: String,
    /// Descending order when true.
    pub descending: bool,
}

/// A collection query: filters, optional ordering, optional limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Query {
    /// Query returning every document in the collection.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Order results by a field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Keyed document storage grouped into named collections.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch a document by collection and id.
    ///
    /// Returns `Ok(None)` when the document does not exist; `Err` only for
    /// store-level failures.
    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<StoredDocument>, StoreError>> + Send;

    /// Run a filtered query over a collection.
    fn query_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<StoredDocument>, StoreError>> + Send;

    /// Create or replace a document.
    fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merge the given fields into an existing document.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
