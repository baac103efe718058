//! Identity issued by the external identity provider.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::SubjectId;

/// A signed-in identity as reported by the identity provider.
///
/// The provider is the sole authority on this value; the panel never creates
/// or mutates identities, only observes them. Holding an `Identity` says
/// nothing about authorization - that requires a matching
/// [`AdminRecord`](crate::AdminRecord) in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque subject identifier, stable across sessions.
    pub uid: SubjectId,
    /// Email address the provider has on file for the subject.
    pub email: Email,
}

impl Identity {
    /// Create an identity from provider data.
    #[must_use]
    pub const fn new(uid: SubjectId, email: Email) -> Self {
        Self { uid, email }
    }
}
