//! Staff roles for the admin registry.

use serde::{Deserialize, Serialize};

/// Staff role with different permission levels.
///
/// The role is stored on the [`AdminRecord`](crate::AdminRecord) and is
/// advisory for UI surfaces; existence of the record itself is what grants
/// panel access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access, including managing the admin registry itself.
    SuperAdmin,
    /// Full access to user, chat, story, and call management.
    Admin,
    /// Access to reports and content moderation actions.
    Moderator,
    /// Read-only access to metrics and exports.
    Analyst,
}

impl AdminRole {
    /// Whether this role may modify the admin registry.
    #[must_use]
    pub const fn can_manage_registry(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::Moderator => write!(f, "moderator"),
            Self::Analyst => write!(f, "analyst"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "analyst" => Ok(Self::Analyst),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_from_str_agree() {
        for role in [
            AdminRole::SuperAdmin,
            AdminRole::Admin,
            AdminRole::Moderator,
            AdminRole::Analyst,
        ] {
            let parsed: AdminRole = role.to_string().parse().expect("parse");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn rejects_unknown_role() {
        assert!("owner".parse::<AdminRole>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AdminRole::SuperAdmin).expect("serialize");
        assert_eq!(json, "\"super_admin\"");
        let role: AdminRole = serde_json::from_str("\"moderator\"").expect("deserialize");
        assert_eq!(role, AdminRole::Moderator);
    }

    #[test]
    fn only_super_admin_manages_registry() {
        assert!(AdminRole::SuperAdmin.can_manage_registry());
        assert!(!AdminRole::Admin.can_manage_registry());
        assert!(!AdminRole::Moderator.can_manage_registry());
        assert!(!AdminRole::Analyst.can_manage_registry());
    }
}
