use serde::{Deserialize, Serialize};

use super::identity::{DepartmentCode, UserId};

/// The slice of a task record the visibility filter reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub board_key: String,
    #[serde(default)]
    pub column_id: String,
    #[serde(default)]
    pub title: String,
    pub creator_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<UserId>,
    /// Inherited from the creator when the task was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentCode>,
}

impl Task {
    pub fn new(id: impl Into<String>, board_key: impl Into<String>, creator_id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            board_key: board_key.into(),
            column_id: String::new(),
            title: String::new(),
            creator_id: creator_id.into(),
            assignee_id: None,
            department: None,
        }
    }

    pub fn with_assignee(mut self, assignee: impl Into<UserId>) -> Self {
        self.assignee_id = Some(assignee.into());
        self
    }

    pub fn with_department(mut self, department: impl AsRef<str>) -> Self {
        self.department = Some(DepartmentCode::new(department));
        self
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.creator_id == user_id || self.assignee_id.as_ref() == Some(user_id)
    }
}
