//! Access resolution and visibility engine
//!
//! This module decides, for a verified identity:
//! - which canonical roles it currently holds (declared roles plus scoped bindings)
//! - which boards it may see or modify (role, group, member/owner modes with a department veto)
//! - which tasks of a visible board it may view (ownership, department or board-wide)
//!
//! Everything below [`AuthorizationGuard`] is a pure function of the data it is handed.

mod board;
mod canonical;
mod guard;
mod resolver;
mod subject;
mod task;

pub use board::{can_see_board, can_write_board, evaluate as evaluate_board, visible_boards, BoardGrant, BoardVerdict, HiddenReason, WriteKind};
pub use canonical::{canonicalize, canonicalize_set, CanonicalRole, RoleSet};
pub use guard::{decide, Action, AuthorizationGuard, Decision, DenyReason, TaskChange};
pub use resolver::{effective_roles, BindingContext, BindingSnapshot, EffectiveRoles, RoleBindingResolver};
pub use subject::{ActiveGroups, Subject};
pub use task::{filter_class, task_predicate, FilterClass, TaskFilter, TaskScope};

/// Well-known canonical role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const CEO: &str = "ceo";
    pub const COO: &str = "coo";
    pub const CTO: &str = "cto";
    pub const DEPARTMENT_HEAD: &str = "department_head";
    pub const TEAM_LEAD: &str = "team_lead";
    pub const BUYER: &str = "buyer";
    pub const DESIGNER: &str = "designer";
    pub const TECH: &str = "tech";
    pub const OFFICE_MANAGER: &str = "office_manager";
}
