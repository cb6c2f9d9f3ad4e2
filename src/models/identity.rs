use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AccessError;

/// Opaque user identifier supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Department key, always trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DepartmentCode(String);

impl DepartmentCode {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DepartmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DepartmentCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for DepartmentCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<DepartmentCode> for String {
    fn from(value: DepartmentCode) -> Self {
        value.0
    }
}

/// A verified identity as handed over by the authentication layer.
///
/// Immutable for the duration of a request. `roles` holds the declared role
/// strings as stored; canonicalization happens during resolution and never
/// writes back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub departments: Vec<DepartmentCode>,
    /// Static capability roles such as `admin`.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Identity {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            group_ids: Vec::new(),
            departments: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_ids = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.departments = departments.into_iter().map(DepartmentCode::new).collect();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_department(&self, department: &DepartmentCode) -> bool {
        self.departments.iter().any(|d| d == department)
    }

    pub fn in_any_department<'a>(&self, departments: impl IntoIterator<Item = &'a DepartmentCode>) -> bool {
        departments.into_iter().any(|d| self.in_department(d))
    }

    /// Rejects identities that cannot have come from a verified principal.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.id.is_blank() {
            return Err(AccessError::unauthenticated("identity has no user id"));
        }
        if self.departments.iter().all(DepartmentCode::is_empty) {
            return Err(AccessError::unauthenticated(format!(
                "identity {} carries no department",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departments_are_upper_cased() {
        let identity = Identity::new("u1").with_departments([" gambling ", "Swip"]);
        assert_eq!(identity.departments[0].as_str(), "GAMBLING");
        assert_eq!(identity.departments[1].as_str(), "SWIP");
        assert!(identity.in_department(&DepartmentCode::new("gambling")));
    }

    #[test]
    fn deserialized_departments_are_normalized() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "roles": ["Buyer"],
            "departments": ["sweeps"]
        }))
        .unwrap();
        assert_eq!(identity.departments, vec![DepartmentCode::new("SWEEPS")]);
        assert!(identity.capabilities.is_empty());
    }

    #[test]
    fn malformed_identities_fail_validation() {
        assert!(Identity::new("  ").with_departments(["OPS"]).validate().is_err());
        assert!(Identity::new("u1").validate().is_err());
        assert!(Identity::new("u1").with_departments([""]).validate().is_err());
        assert!(Identity::new("u1").with_departments(["OPS"]).validate().is_ok());
    }
}
