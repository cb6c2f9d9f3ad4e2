use std::collections::HashSet;

use super::canonical::{canonicalize_set, CanonicalRole, RoleSet};
use super::resolver::EffectiveRoles;
use crate::config::AuthzConfig;
use crate::models::{Group, Identity};

/// Group ids that currently grant anything to an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveGroups(HashSet<String>);

impl ActiveGroups {
    /// Active groups the identity names or is listed in. Unknown ids count as inactive.
    pub fn resolve(identity: &Identity, groups: &[Group]) -> Self {
        let ids = groups
            .iter()
            .filter(|g| g.is_active)
            .filter(|g| identity.group_ids.contains(&g.id) || g.member_ids.contains(&identity.id))
            .map(|g| g.id.clone())
            .collect();
        Self(ids)
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.0.contains(group_id)
    }

    /// First id of `candidates` that is an active membership.
    pub fn first_shared<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates.iter().map(String::as_str).find(|id| self.contains(id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The identity as seen by the evaluators for one request.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    pub identity: &'a Identity,
    pub roles: EffectiveRoles,
    pub groups: ActiveGroups,
    admin: bool,
}

impl<'a> Subject<'a> {
    pub fn new(identity: &'a Identity, roles: EffectiveRoles, groups: ActiveGroups, config: &AuthzConfig) -> Self {
        let capabilities = canonicalize_set(&identity.capabilities);
        let admin = roles.roles.intersects(&config.admin_roles) || capabilities.intersects(&config.admin_roles);
        Self {
            identity,
            roles,
            groups,
            admin,
        }
    }

    /// Holds an administrative role or capability.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn first_role_in<'r>(&self, candidates: impl IntoIterator<Item = &'r CanonicalRole>) -> Option<&CanonicalRole> {
        self.roles.roles.first_shared(candidates)
    }

    pub fn holds_any(&self, candidates: &RoleSet) -> bool {
        self.roles.roles.intersects(candidates)
    }
}
