//! Role alias normalization.
//!
//! Every role string that enters the engine (declared roles, bindings, board
//! allow-lists, configuration) passes through [`canonicalize`], so two
//! spellings of the same role always compare equal.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Normalized alias -> canonical role. Keys are already in normalized form.
const ALIASES: &[(&str, &str)] = &[
    ("head", "team_lead"),
    ("head_lead", "team_lead"),
    ("tl", "team_lead"),
    ("teamlead", "team_lead"),
    ("lead", "team_lead"),
    ("administrator", "admin"),
    ("superuser", "admin"),
    ("super_admin", "admin"),
    ("root", "admin"),
    ("dept_head", "department_head"),
    ("head_of_department", "department_head"),
    ("media_buyer", "buyer"),
    ("design", "designer"),
    ("developer", "tech"),
    ("dev", "tech"),
    ("engineer", "tech"),
    ("office", "office_manager"),
    ("office_mgr", "office_manager"),
];

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| ALIASES.iter().copied().collect())
}

/// A normalized role token. Only obtainable through [`canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalRole(String);

impl CanonicalRole {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for CanonicalRole {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalRole {
    fn from(raw: &str) -> Self {
        canonicalize(raw)
    }
}

impl From<String> for CanonicalRole {
    fn from(raw: String) -> Self {
        canonicalize(&raw)
    }
}

impl From<CanonicalRole> for String {
    fn from(role: CanonicalRole) -> Self {
        role.0
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Maps any spelling of a role to its canonical token.
///
/// Unknown roles pass through in normalized form so administratively defined
/// custom roles stay usable.
pub fn canonicalize(raw: &str) -> CanonicalRole {
    let normalized = normalize(raw);
    match alias_table().get(normalized.as_str()) {
        Some(canonical) => CanonicalRole((*canonical).to_string()),
        None => CanonicalRole(normalized),
    }
}

/// Canonicalizes and deduplicates, dropping blank tokens.
pub fn canonicalize_set<I, S>(raw: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|r| canonicalize(r.as_ref())).collect()
}

/// Deduplicated roles in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(Vec<CanonicalRole>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for duplicates and blank roles.
    pub fn insert(&mut self, role: CanonicalRole) -> bool {
        if role.is_empty() || self.0.contains(&role) {
            return false;
        }
        self.0.push(role);
        true
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r.as_str() == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRole> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn union(&self, other: &RoleSet) -> RoleSet {
        self.iter().chain(other.iter()).cloned().collect()
    }

    /// First role of `self` that also appears in `candidates`.
    pub fn first_shared<'a>(&self, candidates: impl IntoIterator<Item = &'a CanonicalRole>) -> Option<&CanonicalRole> {
        let candidates: Vec<&CanonicalRole> = candidates.into_iter().collect();
        self.0.iter().find(|r| candidates.contains(r))
    }

    pub fn intersects<'a>(&self, candidates: impl IntoIterator<Item = &'a CanonicalRole>) -> bool {
        self.first_shared(candidates).is_some()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|r| r.to_string()).collect()
    }
}

impl FromIterator<CanonicalRole> for RoleSet {
    fn from_iter<T: IntoIterator<Item = CanonicalRole>>(iter: T) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl IntoIterator for RoleSet {
    type Item = CanonicalRole;
    type IntoIter = std::vec::IntoIter<CanonicalRole>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a CanonicalRole;
    type IntoIter = std::slice::Iter<'a, CanonicalRole>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
