//! The session guard's observable state.

use serde::Serialize;

use crypted_core::{AdminRecord, Identity};

/// Authorization state derived from the identity provider session and the
/// admin registry. Never persisted; owned exclusively by the guard, read by
/// everything else.
///
/// Readers act on the terminal states only: `Unauthenticated` and
/// `Rejected` mean "redirect to login", `Authorized` means "render the
/// protected surface", and `Resolving` means "show a loading indicator".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// No provider session exists.
    Unauthenticated,

    /// A provider session was reported and its registry lookup is in
    /// flight. `identity` is `None` only at startup, before the provider
    /// has reported whether a persisted session exists.
    Resolving {
        #[serde(skip_serializing_if = "Option::is_none")]
        identity: Option<Identity>,
    },

    /// A provider session existed but had no registry entry. The provider
    /// session has already been revoked by the time this state is visible.
    Rejected,

    /// A provider session backed by a registry entry.
    Authorized {
        identity: Identity,
        record: AdminRecord,
    },
}

impl SessionState {
    /// The guard's startup state, before the provider has reported whether
    /// a persisted session exists.
    #[must_use]
    pub const fn initial() -> Self {
        Self::Resolving { identity: None }
    }

    /// Whether protected content may be rendered in this state.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }

    /// Whether the guard is still resolving a provider notification.
    #[must_use]
    pub const fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving { .. })
    }

    /// The authorized admin record, if any.
    #[must_use]
    pub const fn record(&self) -> Option<&AdminRecord> {
        match self {
            Self::Authorized { record, .. } => Some(record),
            _ => None,
        }
    }
}
