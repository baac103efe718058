//! Permission sets carried on admin registry records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The sentinel permission name that grants everything.
pub const ALL_PERMISSIONS: &str = "all";

/// The set of named permissions granted to a staff member.
///
/// Stored in the registry document as an array of strings; the single
/// sentinel value `"all"` grants every permission. Any set containing the
/// sentinel collapses to [`PermissionSet::All`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum PermissionSet {
    /// Sentinel: every permission, current and future.
    All,
    /// An explicit set of permission names.
    Named(BTreeSet<String>),
}

impl PermissionSet {
    /// An empty permission set.
    #[must_use]
    pub const fn none() -> Self {
        Self::Named(BTreeSet::new())
    }

    /// Build a named set from an iterator of permission names.
    ///
    /// Collapses to [`PermissionSet::All`] if the sentinel is present.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if set.contains(ALL_PERMISSIONS) {
            Self::All
        } else {
            Self::Named(set)
        }
    }

    /// Whether this set grants the named permission.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(set) => set.contains(name),
        }
    }

    /// Whether this set grants nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Named(set) => set.is_empty(),
        }
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(names: Vec<String>) -> Self {
        Self::named(names)
    }
}

impl From<PermissionSet> for Vec<String> {
    fn from(set: PermissionSet) -> Self {
        match set {
            PermissionSet::All => vec![ALL_PERMISSIONS.to_owned()],
            PermissionSet::Named(set) => set.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_allows_everything() {
        let set = PermissionSet::All;
        assert!(set.allows("users"));
        assert!(set.allows("reports"));
        assert!(!set.is_empty());
    }

    #[test]
    fn named_allows_only_members() {
        let set = PermissionSet::named(["users", "reports"]);
        assert!(set.allows("users"));
        assert!(!set.allows("calls"));
    }

    #[test]
    fn sentinel_collapses_to_all() {
        let set = PermissionSet::named(["users", "all"]);
        assert_eq!(set, PermissionSet::All);
    }

    #[test]
    fn empty_set_grants_nothing() {
        let set = PermissionSet::none();
        assert!(set.is_empty());
        assert!(!set.allows("users"));
    }

    #[test]
    fn serde_round_trips_as_string_array() {
        let set = PermissionSet::named(["reports", "users"]);
        let json = serde_json::to_string(&set).expect("serialize");
        assert_eq!(json, "[\"reports\",\"users\"]");

        let all: PermissionSet = serde_json::from_str("[\"all\"]").expect("deserialize");
        assert_eq!(all, PermissionSet::All);
    }
}
