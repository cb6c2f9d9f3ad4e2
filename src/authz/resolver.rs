use std::sync::Arc;

use serde::Serialize;

use super::canonical::{canonicalize, canonicalize_set, RoleSet};
use crate::config::DepartmentScopeRule;
use crate::errors::AccessError;
use crate::models::{Board, DepartmentCode, Identity, RoleBinding, ScopeKind};
use crate::store::RoleBindingStore;

/// Request coordinates that decide which scoped bindings apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    pub board_key: Option<String>,
    pub department: Option<DepartmentCode>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(mut self, key: impl Into<String>) -> Self {
        self.board_key = Some(key.into());
        self
    }

    pub fn with_department(mut self, department: impl AsRef<str>) -> Self {
        self.department = Some(DepartmentCode::new(department));
        self
    }

    /// Context of a request that targets `board`.
    pub fn for_board(board: &Board) -> Self {
        Self {
            board_key: Some(board.key.clone()),
            department: board.default_department.clone(),
        }
    }
}

/// Effective roles for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveRoles {
    pub roles: RoleSet,
    /// Bindings could not be loaded; `roles` holds base roles only.
    pub degraded: bool,
}

impl EffectiveRoles {
    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

fn scope_applies(
    binding: &RoleBinding,
    identity: &Identity,
    ctx: &BindingContext,
    rule: DepartmentScopeRule,
) -> bool {
    let value = binding.scope.value.as_deref();
    match binding.scope.kind {
        ScopeKind::Global => true,
        ScopeKind::Board => match (value, ctx.board_key.as_deref()) {
            (Some(scoped), Some(current)) => scoped == current,
            _ => false,
        },
        ScopeKind::Department => {
            let Some(scoped) = value.map(DepartmentCode::new) else {
                return false;
            };
            match rule {
                DepartmentScopeRule::RequestDepartment => ctx.department.as_ref() == Some(&scoped),
                DepartmentScopeRule::IdentityDepartment => identity.in_department(&scoped),
            }
        }
    }
}

/// Base roles plus every active, in-scope binding of this identity.
///
/// Pure: never touches `identity` and keeps nothing between calls.
pub fn effective_roles(
    identity: &Identity,
    bindings: &[RoleBinding],
    ctx: &BindingContext,
    rule: DepartmentScopeRule,
) -> RoleSet {
    let base = canonicalize_set(&identity.roles);

    let granted: RoleSet = bindings
        .iter()
        .filter(|b| b.is_active && b.user_id == identity.id)
        .filter(|b| scope_applies(b, identity, ctx, rule))
        .map(|b| canonicalize(b.role.as_str()))
        .collect();

    base.union(&granted)
}

/// Bindings fetched for one identity at the start of a request.
#[derive(Debug, Clone, Default)]
pub struct BindingSnapshot {
    pub bindings: Vec<RoleBinding>,
    pub degraded: bool,
}

impl BindingSnapshot {
    pub fn new(bindings: Vec<RoleBinding>) -> Self {
        Self {
            bindings,
            degraded: false,
        }
    }

    /// Snapshot used when the store failed: no bindings contribute.
    pub fn unavailable() -> Self {
        Self {
            bindings: Vec::new(),
            degraded: true,
        }
    }

    pub fn effective_roles(&self, identity: &Identity, ctx: &BindingContext, rule: DepartmentScopeRule) -> EffectiveRoles {
        EffectiveRoles {
            roles: effective_roles(identity, &self.bindings, ctx, rule),
            degraded: self.degraded,
        }
    }
}

/// Loads binding snapshots, failing closed when the store is down.
#[derive(Clone)]
pub struct RoleBindingResolver {
    store: Arc<dyn RoleBindingStore>,
    rule: DepartmentScopeRule,
}

impl RoleBindingResolver {
    pub fn new(store: Arc<dyn RoleBindingStore>, rule: DepartmentScopeRule) -> Self {
        Self { store, rule }
    }

    pub async fn snapshot(&self, identity: &Identity) -> BindingSnapshot {
        match self.store.bindings_for(&identity.id).await {
            Ok(bindings) => BindingSnapshot::new(bindings),
            Err(err) => {
                let err = AccessError::binding_store_unavailable(err.to_string());
                tracing::warn!(
                    user_id = %identity.id,
                    error = %err,
                    "falling back to base roles"
                );
                BindingSnapshot::unavailable()
            }
        }
    }

    pub async fn resolve(&self, identity: &Identity, ctx: &BindingContext) -> EffectiveRoles {
        self.snapshot(identity).await.effective_roles(identity, ctx, self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BindingScope, UserId};
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl RoleBindingStore for DownStore {
        async fn bindings_for(&self, _user_id: &UserId) -> Result<Vec<RoleBinding>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    fn buyer() -> Identity {
        Identity::new("u1").with_roles(["Buyer"]).with_departments(["GAMBLING"])
    }

    #[test]
    fn base_roles_are_canonicalized() {
        let roles = effective_roles(&buyer(), &[], &BindingContext::new(), DepartmentScopeRule::default());
        assert_eq!(roles.to_strings(), vec!["buyer"]);
    }

    #[test]
    fn global_binding_always_applies_and_is_monotonic() {
        let identity = buyer();
        let bindings = vec![RoleBinding::new("u1", "designer", BindingScope::global())];
        let ctx = BindingContext::new().with_board("ANY");
        let base = effective_roles(&identity, &[], &ctx, DepartmentScopeRule::default());
        let roles = effective_roles(&identity, &bindings, &ctx, DepartmentScopeRule::default());
        assert!(base.iter().all(|r| roles.contains(r)));
        assert!(roles.contains("designer"));
    }

    #[test]
    fn board_binding_needs_matching_board() {
        let identity = buyer();
        let bindings = vec![RoleBinding::new("u1", "tl", BindingScope::board("TECH"))];
        let rule = DepartmentScopeRule::default();

        let on_board = effective_roles(&identity, &bindings, &BindingContext::new().with_board("TECH"), rule);
        assert!(on_board.contains("team_lead"));

        let elsewhere = effective_roles(&identity, &bindings, &BindingContext::new().with_board("DES"), rule);
        assert!(!elsewhere.contains("team_lead"));

        let no_board = effective_roles(&identity, &bindings, &BindingContext::new(), rule);
        assert!(!no_board.contains("team_lead"));
    }

    #[test]
    fn department_binding_request_rule() {
        let identity = buyer();
        let bindings = vec![RoleBinding::new("u1", "dept-head", BindingScope::department("sweeps"))];
        let rule = DepartmentScopeRule::RequestDepartment;

        let in_request = BindingContext::new().with_department("SWEEPS");
        assert!(effective_roles(&identity, &bindings, &in_request, rule).contains("department_head"));

        // The identity is not in SWEEPS, but the request is: that is what counts here.
        let own_department = BindingContext::new().with_department("GAMBLING");
        assert!(!effective_roles(&identity, &bindings, &own_department, rule).contains("department_head"));
        assert!(!effective_roles(&identity, &bindings, &BindingContext::new(), rule).contains("department_head"));
    }

    #[test]
    fn department_binding_identity_rule() {
        let identity = buyer();
        let rule = DepartmentScopeRule::IdentityDepartment;

        let own = vec![RoleBinding::new("u1", "dept-head", BindingScope::department("gambling"))];
        assert!(effective_roles(&identity, &own, &BindingContext::new(), rule).contains("department_head"));

        let foreign = vec![RoleBinding::new("u1", "dept-head", BindingScope::department("SWEEPS"))];
        let ctx = BindingContext::new().with_department("SWEEPS");
        assert!(!effective_roles(&identity, &foreign, &ctx, rule).contains("department_head"));
    }

    #[test]
    fn inactive_foreign_and_valueless_bindings_are_ignored() {
        let identity = buyer();
        let bindings = vec![
            RoleBinding::new("u1", "admin", BindingScope::global()).deactivated(),
            RoleBinding::new("u2", "ceo", BindingScope::global()),
            RoleBinding {
                user_id: UserId::new("u1"),
                role: canonicalize("tech"),
                scope: BindingScope {
                    kind: ScopeKind::Board,
                    value: None,
                },
                is_active: true,
            },
        ];
        let ctx = BindingContext::new().with_board("TECH");
        let roles = effective_roles(&identity, &bindings, &ctx, DepartmentScopeRule::default());
        assert_eq!(roles.to_strings(), vec!["buyer"]);
    }

    #[test]
    fn identity_roles_are_not_mutated() {
        let identity = buyer();
        let bindings = vec![RoleBinding::new("u1", "designer", BindingScope::global())];
        let _ = effective_roles(&identity, &bindings, &BindingContext::new(), DepartmentScopeRule::default());
        assert_eq!(identity.roles, vec!["Buyer".to_string()]);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let resolver = RoleBindingResolver::new(Arc::new(DownStore), DepartmentScopeRule::default());
        let roles = resolver.resolve(&buyer(), &BindingContext::new()).await;
        assert!(roles.degraded);
        assert_eq!(roles.roles.to_strings(), vec!["buyer"]);
    }

    #[tokio::test]
    async fn deactivation_is_seen_on_next_resolution() {
        let store = Arc::new(MemoryStore::new());
        let binding = RoleBinding::new("u1", "designer", BindingScope::global());
        let key = binding.key();
        store.upsert_binding(binding).await;

        let resolver = RoleBindingResolver::new(store.clone(), DepartmentScopeRule::default());
        let ctx = BindingContext::new();
        assert!(resolver.resolve(&buyer(), &ctx).await.contains("designer"));

        store.deactivate_binding(&key).await;
        let after = resolver.resolve(&buyer(), &ctx).await;
        assert!(!after.contains("designer"));
        assert!(!after.degraded);
    }
}
