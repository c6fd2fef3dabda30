//! Role-based gating of scheduling actions.
//!
//! Restricted roles may look at the calendar and the day detail view but
//! can never originate a drag, commit a range or unschedule an order.

use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_RESTRICTED_ROLES: [&str; 2] = ["sales", "commercial"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(String);

impl Role {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    restricted: BTreeSet<Role>,
}

impl AccessPolicy {
    pub fn new<I, R>(restricted: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        Self {
            restricted: restricted
                .into_iter()
                .map(|role| Role::new(role.as_ref()))
                .filter(|role| !role.as_str().is_empty())
                .collect(),
        }
    }

    pub fn is_restricted(&self, role: &Role) -> bool {
        self.restricted.contains(role)
    }

    pub fn can_schedule(&self, role: &Role) -> bool {
        !self.is_restricted(role)
    }

    pub fn restricted_roles(&self) -> impl Iterator<Item = &Role> {
        self.restricted.iter()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RESTRICTED_ROLES)
    }
}

/// The caller of a board: who they are and which policy applies to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
    pub access: AccessPolicy,
}

impl Viewer {
    pub fn new(role: Role, access: AccessPolicy) -> Self {
        Self { role, access }
    }

    pub fn can_schedule(&self) -> bool {
        self.access.can_schedule(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessPolicy, Role, Viewer};

    #[test]
    fn default_policy_restricts_sales_roles() {
        let policy = AccessPolicy::default();
        assert!(!policy.can_schedule(&Role::new("sales")));
        assert!(!policy.can_schedule(&Role::new(" Commercial ")));
        assert!(policy.can_schedule(&Role::new("planner")));
    }

    #[test]
    fn custom_policy_ignores_blank_entries() {
        let policy = AccessPolicy::new(["", "viewer"]);
        assert_eq!(policy.restricted_roles().count(), 1);

        let viewer = Viewer::new(Role::new("VIEWER"), policy);
        assert!(!viewer.can_schedule());
    }
}
