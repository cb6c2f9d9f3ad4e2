use serde::{Deserialize, Serialize};

use super::identity::{DepartmentCode, UserId};
use crate::authz::CanonicalRole;
use crate::errors::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    #[default]
    Tasks,
    Expenses,
}

impl BoardKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "tasks" => Some(BoardKind::Tasks),
            "expenses" => Some(BoardKind::Expenses),
            _ => None,
        }
    }
}

/// What non-owner viewers may do on a visible board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPermissions {
    #[serde(default = "yes")]
    pub read: bool,
    #[serde(default = "yes")]
    pub create: bool,
    #[serde(default = "yes")]
    pub edit: bool,
    #[serde(default)]
    pub manage: bool,
}

fn yes() -> bool {
    true
}

impl Default for BoardPermissions {
    fn default() -> Self {
        Self {
            read: true,
            create: true,
            edit: true,
            manage: false,
        }
    }
}

/// Visibility configuration of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: BoardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_mode: Option<String>,
    #[serde(default)]
    pub allowed_roles: Vec<CanonicalRole>,
    #[serde(default)]
    pub allowed_group_ids: Vec<String>,
    #[serde(default)]
    pub members: Vec<UserId>,
    #[serde(default)]
    pub owners: Vec<UserId>,
    /// Empty means no department restriction.
    #[serde(default)]
    pub visible_departments: Vec<DepartmentCode>,
    /// Roles that see every task on this board.
    #[serde(default)]
    pub viewer_roles: Vec<CanonicalRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_department: Option<DepartmentCode>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub permissions: BoardPermissions,
    #[serde(default)]
    pub is_archived: bool,
}

impl Board {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            kind: BoardKind::default(),
            visibility_mode: None,
            allowed_roles: Vec::new(),
            allowed_group_ids: Vec::new(),
            members: Vec::new(),
            owners: Vec::new(),
            visible_departments: Vec::new(),
            viewer_roles: Vec::new(),
            default_department: None,
            public: false,
            permissions: BoardPermissions::default(),
            is_archived: false,
        }
    }

    pub fn with_kind(mut self, kind: BoardKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.visibility_mode = Some(mode.into());
        self
    }

    pub fn with_allowed_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_roles = roles.into_iter().map(|r| CanonicalRole::from(r.as_ref())).collect();
        self
    }

    pub fn with_allowed_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_group_ids = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_visible_departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.visible_departments = departments.into_iter().map(DepartmentCode::new).collect();
        self
    }

    pub fn with_viewer_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.viewer_roles = roles.into_iter().map(|r| CanonicalRole::from(r.as_ref())).collect();
        self
    }

    pub fn with_default_department(mut self, department: impl AsRef<str>) -> Self {
        self.default_department = Some(DepartmentCode::new(department));
        self
    }

    pub fn with_permissions(mut self, permissions: BoardPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn archived(mut self) -> Self {
        self.is_archived = true;
        self
    }

    pub fn is_owner(&self, user_id: &UserId) -> bool {
        self.owners.contains(user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    /// Checks the declared visibility mode. Absent, `users` and `groups` are
    /// accepted; `users` may not list groups and `groups` may not list members.
    pub fn validate_visibility(&self) -> Result<(), AccessError> {
        let mode = self
            .visibility_mode
            .as_deref()
            .map(|m| m.trim().to_lowercase())
            .unwrap_or_default();

        match mode.as_str() {
            "" => Ok(()),
            "users" if !self.allowed_group_ids.is_empty() => Err(AccessError::configuration(format!(
                "board {} is in users mode but lists allowed groups",
                self.key
            ))),
            "groups" if !self.members.is_empty() => Err(AccessError::configuration(format!(
                "board {} is in groups mode but lists members",
                self.key
            ))),
            "users" | "groups" => Ok(()),
            other => Err(AccessError::configuration(format!(
                "board {} has unrecognized visibility mode '{}'",
                self.key, other
            ))),
        }
    }
}

/// Named collection of users; only active groups grant board visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_user_id: Option<UserId>,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            department: None,
            lead_user_id: None,
            member_ids: Vec::new(),
            is_active: true,
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.member_ids = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lead(mut self, lead: impl Into<UserId>) -> Self {
        self.lead_user_id = Some(lead.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
