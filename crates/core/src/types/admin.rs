//! The admin registry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::SubjectId;
use super::permission::PermissionSet;
use super::role::AdminRole;

/// An entry in the admin registry.
///
/// Keyed by the identity provider's subject id. Existence of this record is
/// the sole authorization predicate for the panel: identities without one
/// are signed out on sight. Records are created out-of-band by a super
/// admin (via `crypted-cli admins grant`), never by the panel itself.
///
/// Field names are camelCase to match the registry documents as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRecord {
    /// Subject id this record authorizes. Mirrors the document key.
    pub uid: SubjectId,
    /// Staff email address.
    pub email: Email,
    /// Display name shown in the panel.
    pub display_name: String,
    /// Role, advisory for UI surfaces.
    pub role: AdminRole,
    /// Granted permissions, or the `all` sentinel.
    pub permissions: PermissionSet,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Last successful panel sign-in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}
