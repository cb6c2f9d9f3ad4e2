pub mod authz;
pub mod config;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod models;
pub mod store;

// Re-export commonly used items for tests
pub use authz::{Action, AuthorizationGuard, Decision, DenyReason, TaskFilter};
pub use config::{AuthzConfig, DepartmentScopeRule};
pub use errors::{AccessError, AccessResult};
pub use models::{Board, Group, Identity, RoleBinding, Task};
