pub mod binding;
pub mod board;
pub mod identity;
pub mod task;

pub use binding::{BindingKey, BindingScope, RoleBinding, ScopeKind};
pub use board::{Board, BoardKind, BoardPermissions, Group};
pub use identity::{DepartmentCode, Identity, UserId};
pub use task::Task;
