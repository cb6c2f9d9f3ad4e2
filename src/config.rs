use std::collections::HashMap;

use crate::authz::{canonicalize, canonicalize_set, roles, CanonicalRole, RoleSet};
use crate::errors::{AccessError, AccessResult};
use crate::models::BoardKind;

/// When a department-scoped role binding counts as in context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepartmentScopeRule {
    /// The binding's department must equal the department of the current request.
    #[default]
    RequestDepartment,
    /// The binding's department must be one of the identity's own departments.
    IdentityDepartment,
}

impl DepartmentScopeRule {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "request" | "request_department" | "board" => Some(Self::RequestDepartment),
            "identity" | "identity_department" | "user" => Some(Self::IdentityDepartment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Roles that bypass board checks and see every task.
    pub admin_roles: RoleSet,
    /// Roles that see every task of their own departments.
    pub department_viewer_roles: RoleSet,
    /// Board-wide viewer roles per board type, on top of each board's own list.
    pub board_wide_viewers: HashMap<BoardKind, Vec<CanonicalRole>>,
    /// Board types where only admins see beyond their own tasks.
    pub ownership_only_kinds: Vec<BoardKind>,
    pub department_scope: DepartmentScopeRule,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_roles: canonicalize_set([roles::ADMIN, roles::CEO, roles::COO, roles::CTO]),
            department_viewer_roles: canonicalize_set([roles::DEPARTMENT_HEAD, roles::OFFICE_MANAGER]),
            board_wide_viewers: HashMap::new(),
            ownership_only_kinds: vec![BoardKind::Expenses],
            department_scope: DepartmentScopeRule::default(),
        }
    }
}

impl AuthzConfig {
    pub fn from_env() -> AccessResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> AccessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("AUTHZ_ADMIN_ROLES") {
            config.admin_roles = canonicalize_set(split_list(&raw));
            if config.admin_roles.is_empty() {
                return Err(AccessError::configuration("AUTHZ_ADMIN_ROLES must name at least one role"));
            }
        }

        if let Some(raw) = lookup("AUTHZ_DEPARTMENT_VIEWER_ROLES") {
            config.department_viewer_roles = canonicalize_set(split_list(&raw));
        }

        if let Some(raw) = lookup("AUTHZ_DEPARTMENT_SCOPE") {
            config.department_scope = DepartmentScopeRule::parse(&raw).ok_or_else(|| {
                AccessError::configuration(format!(
                    "AUTHZ_DEPARTMENT_SCOPE must be 'request' or 'identity', got '{raw}'"
                ))
            })?;
        }

        if let Some(raw) = lookup("AUTHZ_OWNERSHIP_ONLY_KINDS") {
            config.ownership_only_kinds = split_list(&raw)
                .map(|kind| {
                    BoardKind::parse(kind)
                        .ok_or_else(|| AccessError::configuration(format!("unknown board kind '{kind}'")))
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(config)
    }

    pub fn with_department_scope(mut self, rule: DepartmentScopeRule) -> Self {
        self.department_scope = rule;
        self
    }

    pub fn with_board_wide_viewer(mut self, kind: BoardKind, role: &str) -> Self {
        self.board_wide_viewers.entry(kind).or_default().push(canonicalize(role));
        self
    }

    pub fn is_ownership_only(&self, kind: BoardKind) -> bool {
        self.ownership_only_kinds.contains(&kind)
    }

    pub fn board_wide_viewers_for(&self, kind: BoardKind) -> &[CanonicalRole] {
        self.board_wide_viewers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
