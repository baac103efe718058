//! Firebase clients: identity provider and document store.
//!
//! Crypted's hosted backend is Firebase: staff accounts live in Firebase
//! Authentication and the business data (including the admin registry and
//! the audit log) lives in Firestore. This module implements the guard's
//! [`IdentityProvider`](crate::services::guard::IdentityProvider) and
//! [`DocumentStore`](crate::services::guard::DocumentStore) traits against
//! the two services' REST APIs.
//!
//! Firestore reads and writes authenticate with the signed-in admin's own
//! id token, so store access follows the provider session exactly: no
//! session, no data.

mod auth;
mod error;
mod firestore;
pub mod value;

pub use auth::FirebaseAuthClient;
pub use error::FirebaseError;
pub use firestore::FirestoreClient;
