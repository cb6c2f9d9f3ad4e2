use serde::Serialize;

use super::subject::Subject;
use crate::config::AuthzConfig;
use crate::models::{Board, DepartmentCode, Task, UserId};

/// Predicate classes, narrowest first. `Ord` follows breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterClass {
    Ownership,
    Department,
    Unrestricted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum TaskScope {
    Unrestricted,
    /// Tasks tagged with one of `departments`, plus the owner's own tasks.
    Department {
        departments: Vec<DepartmentCode>,
        owner: UserId,
    },
    /// Tasks created by or assigned to `owner`.
    Ownership { owner: UserId },
}

/// Which tasks of one board a subject may view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFilter {
    pub board_key: String,
    pub scope: TaskScope,
}

impl TaskFilter {
    pub fn class(&self) -> FilterClass {
        match self.scope {
            TaskScope::Unrestricted => FilterClass::Unrestricted,
            TaskScope::Department { .. } => FilterClass::Department,
            TaskScope::Ownership { .. } => FilterClass::Ownership,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if task.board_key != self.board_key {
            return false;
        }
        match &self.scope {
            TaskScope::Unrestricted => true,
            TaskScope::Department { departments, owner } => {
                task.is_owned_by(owner)
                    || task
                        .department
                        .as_ref()
                        .map(|d| departments.contains(d))
                        .unwrap_or(false)
            }
            TaskScope::Ownership { owner } => task.is_owned_by(owner),
        }
    }

    pub fn apply<'t, I>(&self, tasks: I) -> Vec<&'t Task>
    where
        I: IntoIterator<Item = &'t Task>,
    {
        tasks.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// Broadest class `subject` qualifies for on `board`.
pub fn filter_class(subject: &Subject<'_>, board: &Board, config: &AuthzConfig) -> FilterClass {
    if subject.is_admin() {
        return FilterClass::Unrestricted;
    }
    if config.is_ownership_only(board.kind) {
        return FilterClass::Ownership;
    }

    let mut class = FilterClass::Ownership;
    if subject.holds_any(&config.department_viewer_roles) {
        class = class.max(FilterClass::Department);
    }
    let board_wide = subject.first_role_in(&board.viewer_roles).is_some()
        || subject.first_role_in(config.board_wide_viewers_for(board.kind)).is_some();
    if board_wide {
        class = class.max(FilterClass::Unrestricted);
    }
    class
}

/// Filter for the tasks of `board`. Callers must already have established
/// that the board itself is visible.
pub fn task_predicate(subject: &Subject<'_>, board: &Board, config: &AuthzConfig) -> TaskFilter {
    let owner = subject.identity.id.clone();
    let scope = match filter_class(subject, board, config) {
        FilterClass::Unrestricted => TaskScope::Unrestricted,
        FilterClass::Department => TaskScope::Department {
            departments: subject.identity.departments.clone(),
            owner,
        },
        FilterClass::Ownership => TaskScope::Ownership { owner },
    };

    tracing::debug!(
        user_id = %subject.identity.id,
        board = %board.key,
        scope = ?scope,
        "task filter computed"
    );

    TaskFilter {
        board_key: board.key.clone(),
        scope,
    }
}
