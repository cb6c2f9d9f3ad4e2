use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{GroupStore, RoleBindingStore, StoreError};
use crate::models::{BindingKey, Board, Group, Identity, RoleBinding, Task, UserId};

/// Everything needed to replay access decisions offline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub bindings: Vec<RoleBinding>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub boards: Vec<Board>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Snapshot {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let de = &mut serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(de).map_err(|err| {
            anyhow::anyhow!("invalid snapshot at '{}': {}", err.path(), err.inner())
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("failed to parse snapshot {}", path.display()))
    }

    pub fn identity(&self, user_id: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id.as_str() == user_id)
    }

    pub fn board(&self, key: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.key == key)
    }

    pub fn tasks_on<'a>(&'a self, board_key: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.board_key == board_key)
    }
}

/// In-process binding and group store.
///
/// Writes model the administrative collaborator; the engine itself only reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bindings: RwLock<Vec<RoleBinding>>,
    groups: RwLock<HashMap<String, Group>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut bindings: Vec<RoleBinding> = Vec::with_capacity(snapshot.bindings.len());
        for binding in &snapshot.bindings {
            insert_unique(&mut bindings, binding.clone());
        }

        let groups = snapshot
            .groups
            .iter()
            .map(|g| (g.id.clone(), g.clone()))
            .collect();

        Self {
            bindings: RwLock::new(bindings),
            groups: RwLock::new(groups),
        }
    }

    /// Inserts a binding; an active binding replaces any active one with the same key.
    pub async fn upsert_binding(&self, binding: RoleBinding) {
        let mut bindings = self.bindings.write().await;
        insert_unique(&mut bindings, binding);
    }

    /// Returns whether an active binding with that key existed.
    pub async fn deactivate_binding(&self, key: &BindingKey) -> bool {
        let mut bindings = self.bindings.write().await;
        let mut found = false;
        for binding in bindings.iter_mut().filter(|b| b.is_active && &b.key() == key) {
            binding.is_active = false;
            found = true;
        }
        found
    }

    pub async fn upsert_group(&self, group: Group) {
        self.groups.write().await.insert(group.id.clone(), group);
    }

    pub async fn set_group_active(&self, group_id: &str, active: bool) -> bool {
        match self.groups.write().await.get_mut(group_id) {
            Some(group) => {
                group.is_active = active;
                true
            }
            None => false,
        }
    }
}

fn insert_unique(bindings: &mut Vec<RoleBinding>, binding: RoleBinding) {
    if binding.is_active {
        let key = binding.key();
        bindings.retain(|b| !(b.is_active && b.key() == key));
    }
    bindings.push(binding);
}

#[async_trait]
impl RoleBindingStore for MemoryStore {
    async fn bindings_for(&self, user_id: &UserId) -> Result<Vec<RoleBinding>, StoreError> {
        let bindings = self.bindings.read().await;
        Ok(bindings.iter().filter(|b| &b.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn groups_for(&self, identity: &Identity) -> Result<Vec<Group>, StoreError> {
        let groups = self.groups.read().await;
        Ok(groups
            .values()
            .filter(|g| identity.group_ids.contains(&g.id) || g.member_ids.contains(&identity.id))
            .cloned()
            .collect())
    }

    async fn group(&self, group_id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.groups.read().await.get(group_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BindingScope;

    #[tokio::test]
    async fn upsert_keeps_one_active_binding_per_key() {
        let store = MemoryStore::new();
        store.upsert_binding(RoleBinding::new("u1", "buyer", BindingScope::board("TECH"))).await;
        store.upsert_binding(RoleBinding::new("u1", "Buyer", BindingScope::board("TECH"))).await;
        store.upsert_binding(RoleBinding::new("u1", "buyer", BindingScope::board("DES"))).await;

        let bindings = store.bindings_for(&UserId::new("u1")).await.unwrap();
        assert_eq!(bindings.len(), 2);
    }

    #[tokio::test]
    async fn deactivate_flips_active_flag() {
        let store = MemoryStore::new();
        let binding = RoleBinding::new("u1", "designer", BindingScope::global());
        let key = binding.key();
        store.upsert_binding(binding).await;

        assert!(store.deactivate_binding(&key).await);
        assert!(!store.deactivate_binding(&key).await);

        let bindings = store.bindings_for(&UserId::new("u1")).await.unwrap();
        assert!(bindings.iter().all(|b| !b.is_active));
    }

    #[tokio::test]
    async fn department_spelling_does_not_split_bindings() {
        use crate::authz::{effective_roles, BindingContext};
        use crate::config::DepartmentScopeRule;

        let store = MemoryStore::new();
        let mut lower = RoleBinding::new("u1", "department_head", BindingScope::department("SWEEPS"));
        lower.scope.value = Some("sweeps".to_string());
        store.upsert_binding(lower).await;
        let upper = RoleBinding::new("u1", "department_head", BindingScope::department("SWEEPS"));
        let key = upper.key();
        store.upsert_binding(upper).await;

        let user = UserId::new("u1");
        let active = store
            .bindings_for(&user)
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.is_active)
            .count();
        assert_eq!(active, 1);

        assert!(store.deactivate_binding(&key).await);
        let identity = Identity::new("u1").with_roles(["buyer"]).with_departments(["SWEEPS"]);
        let bindings = store.bindings_for(&user).await.unwrap();
        let ctx = BindingContext::new().with_department("sweeps");
        let roles = effective_roles(&identity, &bindings, &ctx, DepartmentScopeRule::RequestDepartment);
        assert_eq!(roles.to_strings(), vec!["buyer"]);
    }

    #[tokio::test]
    async fn groups_match_by_either_side_of_membership() {
        let store = MemoryStore::new();
        store.upsert_group(Group::new("declared")).await;
        store.upsert_group(Group::new("listed").with_members(["u1"])).await;
        store.upsert_group(Group::new("other")).await;

        let identity = Identity::new("u1").with_groups(["declared"]);
        let mut ids: Vec<String> = store
            .groups_for(&identity)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["declared", "listed"]);
    }

    #[test]
    fn snapshot_errors_name_the_field() {
        let err = Snapshot::from_json_str(r#"{"boards": [{"key": "A", "public": "yes"}]}"#).unwrap_err();
        assert!(err.to_string().contains("boards[0].public"), "{err}");
    }
}
