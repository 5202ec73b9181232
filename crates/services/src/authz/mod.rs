//! Static role/permission model.
//!
//! The permission table is built once at process start and injected into
//! request handlers behind an `Arc`; it is immutable thereafter. Lookups are
//! pure and total: an unknown or unresolvable role simply has no grants and
//! every check fails closed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

/// Per-organization role of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources the permission table knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Leads,
    Users,
    Pipeline,
    Settings,
    Organization,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Invite,
}

/// Visibility tier for read operations on a resource.
///
/// Authorization is not only allow/deny: for readable resources the table
/// also answers *how much* the role may see, so callers can pick the right
/// data filter (requester-created records vs organization-wide).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    /// All records within the active organization
    Organization,
    /// Only records the requester created
    Own,
}

/// Immutable role -> (resource, actions) lookup table.
pub struct PermissionTable {
    grants: HashMap<Role, HashMap<Resource, HashSet<Action>>>,
    read_scopes: HashMap<(Role, Resource), AccessScope>,
}

impl PermissionTable {
    pub fn new() -> Self {
        use Action::*;
        use Resource::*;

        let mut grants: HashMap<Role, HashMap<Resource, HashSet<Action>>> = HashMap::new();
        let mut read_scopes = HashMap::new();

        let mut grant = |role: Role, resource: Resource, actions: &[Action]| {
            grants
                .entry(role)
                .or_default()
                .entry(resource)
                .or_default()
                .extend(actions.iter().copied());
        };

        // Admin: full control over the organization workspace
        grant(Role::Admin, Leads, &[Create, Read, Update, Delete]);
        grant(Role::Admin, Users, &[Create, Read, Update, Delete, Invite]);
        grant(Role::Admin, Pipeline, &[Create, Read, Update, Delete]);
        grant(Role::Admin, Settings, &[Read, Update]);
        grant(Role::Admin, Organization, &[Read, Update, Delete]);

        // User: works leads, reads everything else
        grant(Role::User, Leads, &[Create, Read, Update]);
        grant(Role::User, Users, &[Read]);
        grant(Role::User, Pipeline, &[Read]);
        grant(Role::User, Settings, &[Read]);
        grant(Role::User, Organization, &[Read]);

        // Viewer: read-only, restricted to own records for leads
        grant(Role::Viewer, Leads, &[Read]);
        grant(Role::Viewer, Pipeline, &[Read]);
        grant(Role::Viewer, Organization, &[Read]);

        read_scopes.insert((Role::Admin, Leads), AccessScope::Organization);
        read_scopes.insert((Role::User, Leads), AccessScope::Organization);
        read_scopes.insert((Role::Viewer, Leads), AccessScope::Own);

        Self {
            grants,
            read_scopes,
        }
    }

    /// Returns true iff `role` is granted `action` on `resource`.
    pub fn is_allowed(&self, role: Role, resource: Resource, action: Action) -> bool {
        self.grants
            .get(&role)
            .and_then(|by_resource| by_resource.get(&resource))
            .map(|actions| actions.contains(&action))
            .unwrap_or(false)
    }

    /// Visibility tier for read access, or `None` when the role cannot read
    /// the resource at all.
    pub fn read_scope(&self, role: Role, resource: Resource) -> Option<AccessScope> {
        if !self.is_allowed(role, resource, Action::Read) {
            return None;
        }
        Some(
            self.read_scopes
                .get(&(role, resource))
                .copied()
                .unwrap_or(AccessScope::Organization),
        )
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_full_lead_access() {
        let table = PermissionTable::new();
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(table.is_allowed(Role::Admin, Resource::Leads, action));
        }
    }

    #[test]
    fn ungranted_pairs_are_denied() {
        let table = PermissionTable::new();
        assert!(!table.is_allowed(Role::Viewer, Resource::Leads, Action::Create));
        assert!(!table.is_allowed(Role::Viewer, Resource::Users, Action::Read));
        assert!(!table.is_allowed(Role::User, Resource::Leads, Action::Delete));
        assert!(!table.is_allowed(Role::User, Resource::Organization, Action::Delete));
        assert!(!table.is_allowed(Role::User, Resource::Settings, Action::Update));
    }

    #[test]
    fn only_admin_can_invite() {
        let table = PermissionTable::new();
        assert!(table.is_allowed(Role::Admin, Resource::Users, Action::Invite));
        assert!(!table.is_allowed(Role::User, Resource::Users, Action::Invite));
        assert!(!table.is_allowed(Role::Viewer, Resource::Users, Action::Invite));
    }

    #[test]
    fn viewer_lead_reads_are_scoped_to_own_records() {
        let table = PermissionTable::new();
        assert_eq!(
            table.read_scope(Role::Viewer, Resource::Leads),
            Some(AccessScope::Own)
        );
        assert_eq!(
            table.read_scope(Role::User, Resource::Leads),
            Some(AccessScope::Organization)
        );
        assert_eq!(
            table.read_scope(Role::Admin, Resource::Leads),
            Some(AccessScope::Organization)
        );
    }

    #[test]
    fn unreadable_resources_have_no_scope() {
        let table = PermissionTable::new();
        assert_eq!(table.read_scope(Role::Viewer, Resource::Users), None);
        assert_eq!(table.read_scope(Role::Viewer, Resource::Settings), None);
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::User, Role::Viewer] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("owner"), None);
    }
}
