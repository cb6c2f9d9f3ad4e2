use serde::{Deserialize, Serialize};

use super::identity::{DepartmentCode, UserId};
use crate::authz::CanonicalRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[default]
    Global,
    Board,
    Department,
}

/// Where a binding applies. Department values are stored as [`DepartmentCode`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawScope")]
pub struct BindingScope {
    pub kind: ScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Deserialize)]
struct RawScope {
    kind: ScopeKind,
    #[serde(default)]
    value: Option<String>,
}

impl From<RawScope> for BindingScope {
    fn from(raw: RawScope) -> Self {
        Self {
            kind: raw.kind,
            value: normalize_value(raw.kind, raw.value.as_deref()),
        }
    }
}

fn normalize_value(kind: ScopeKind, value: Option<&str>) -> Option<String> {
    match kind {
        ScopeKind::Department => value.map(|v| DepartmentCode::new(v).as_str().to_string()),
        _ => value.map(str::to_string),
    }
}

impl BindingScope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn board(key: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Board,
            value: Some(key.into()),
        }
    }

    pub fn department(code: impl AsRef<str>) -> Self {
        Self {
            kind: ScopeKind::Department,
            value: normalize_value(ScopeKind::Department, Some(code.as_ref())),
        }
    }

    /// Scope value in the form used for comparison and uniqueness.
    pub fn normalized_value(&self) -> Option<String> {
        normalize_value(self.kind, self.value.as_deref())
    }
}

/// A dynamically granted role, created and deactivated by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub user_id: UserId,
    pub role: CanonicalRole,
    #[serde(default)]
    pub scope: BindingScope,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Identity tuple under which at most one active binding may exist.
pub type BindingKey = (UserId, CanonicalRole, ScopeKind, Option<String>);

impl RoleBinding {
    pub fn new(user_id: impl Into<UserId>, role: impl AsRef<str>, scope: BindingScope) -> Self {
        Self {
            user_id: user_id.into(),
            role: CanonicalRole::from(role.as_ref()),
            scope,
            is_active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn key(&self) -> BindingKey {
        (
            self.user_id.clone(),
            self.role.clone(),
            self.scope.kind,
            self.scope.normalized_value(),
        )
    }
}
