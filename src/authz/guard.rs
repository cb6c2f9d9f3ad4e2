use std::sync::Arc;

use serde::Serialize;

use super::board::{self, BoardGrant, BoardVerdict, WriteKind};
use super::resolver::{BindingContext, BindingSnapshot, EffectiveRoles, RoleBindingResolver};
use super::subject::{ActiveGroups, Subject};
use super::task::{self, TaskFilter};
use crate::config::AuthzConfig;
use crate::errors::AccessError;
use crate::events::{publish_decision, AuditBus, DecisionRecord};
use crate::models::{Board, Group, Identity, Task};
use crate::store::{GroupStore, RoleBindingStore};

/// Which part of a task an edit touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskChange {
    /// Title, description and other content.
    Fields,
    /// Moving the task to another column.
    Move,
    /// Changing the assignee.
    Assign,
}

/// What the caller wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    ViewBoard,
    ListTasks,
    CreateTask,
    EditTask { task: &'a Task, change: TaskChange },
    ManageBoard,
    /// Change the membership of a group.
    ManageGroup(&'a str),
    /// Administer roles, bindings, groups and departments.
    ManageAccess,
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ViewBoard => "view_board",
            Action::ListTasks => "list_tasks",
            Action::CreateTask => "create_task",
            Action::EditTask { change: TaskChange::Fields, .. } => "edit_task",
            Action::EditTask { change: TaskChange::Move, .. } => "move_task",
            Action::EditTask { change: TaskChange::Assign, .. } => "assign_task",
            Action::ManageBoard => "manage_board",
            Action::ManageGroup(_) => "manage_group",
            Action::ManageAccess => "manage_access",
        }
    }

    pub fn targets_board(&self) -> bool {
        !matches!(self, Action::ManageGroup(_) | Action::ManageAccess)
    }

    fn write_kind(&self) -> Option<WriteKind> {
        match self {
            Action::CreateTask => Some(WriteKind::CreateTask),
            Action::EditTask { .. } => Some(WriteKind::EditTask),
            Action::ManageBoard => Some(WriteKind::ManageBoard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    ForbiddenBoard,
    ForbiddenAction,
    ConfigurationError,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::ForbiddenBoard => "forbidden_board",
            DenyReason::ForbiddenAction => "forbidden_action",
            DenyReason::ConfigurationError => "configuration_error",
        }
    }
}

/// Outcome of [`AuthorizationGuard::authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    /// Present on allowed task reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<TaskFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<BoardGrant>,
    /// Role bindings were unavailable and the decision used base roles only.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
            filter: None,
            grant: None,
            degraded: false,
            detail: None,
        }
    }

    pub fn deny(reason: DenyReason, detail: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: Some(reason),
            filter: None,
            grant: None,
            degraded: false,
            detail: Some(detail.into()),
        }
    }

    fn with_grant(mut self, grant: Option<BoardGrant>) -> Self {
        self.grant = grant;
        self
    }

    fn with_filter(mut self, filter: TaskFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    /// Converts a denial into the error callers render; allows yield the task filter.
    pub fn into_result(self) -> Result<Option<TaskFilter>, AccessError> {
        let detail = self.detail.unwrap_or_default();
        match self.reason {
            None if self.allow => Ok(self.filter),
            Some(DenyReason::Unauthenticated) => Err(AccessError::unauthenticated(detail)),
            Some(DenyReason::ConfigurationError) => Err(AccessError::configuration(detail)),
            Some(reason) => Err(AccessError::forbidden(reason.as_str())),
            None => Err(AccessError::forbidden("denied")),
        }
    }
}

/// Pure decision over data already fetched for this request.
///
/// `subject` must have been built for `board`'s binding context.
pub fn decide(
    config: &AuthzConfig,
    subject: &Subject<'_>,
    action: Action<'_>,
    board: Option<&Board>,
    groups: &[Group],
) -> Decision {
    let degraded = subject.roles.degraded;

    if !action.targets_board() {
        return decide_access_action(subject, action, groups).degraded(degraded);
    }

    let Some(board) = board else {
        return Decision::deny(DenyReason::ForbiddenBoard, format!("{} requires a board", action.name()))
            .degraded(degraded);
    };

    let grant = match board::evaluate(subject, board) {
        BoardVerdict::Visible(grant) => grant,
        BoardVerdict::Hidden(reason) => {
            return Decision::deny(DenyReason::ForbiddenBoard, format!("board {} hidden: {:?}", board.key, reason))
                .degraded(degraded)
        }
        BoardVerdict::Misconfigured(detail) => {
            return Decision::deny(DenyReason::ConfigurationError, detail).degraded(degraded)
        }
    };

    if let Some(kind) = action.write_kind() {
        if !board::can_write_board(subject, board, kind) {
            return Decision::deny(
                DenyReason::ForbiddenAction,
                format!("{} not permitted on board {}", action.name(), board.key),
            )
            .with_grant(Some(grant))
            .degraded(degraded);
        }
    }

    if let Action::EditTask { task: target, change } = action {
        let filter = task::task_predicate(subject, board, config);
        if !filter.matches(target) {
            return Decision::deny(
                DenyReason::ForbiddenAction,
                format!("task {} is not visible on board {}", target.id, board.key),
            )
            .with_grant(Some(grant))
            .degraded(degraded);
        }
        if let Some(detail) = restricted_change(config, subject, board, target, change) {
            return Decision::deny(DenyReason::ForbiddenAction, detail)
                .with_grant(Some(grant))
                .degraded(degraded);
        }
    }

    let decision = Decision::allow().with_grant(Some(grant)).degraded(degraded);
    match action {
        Action::ListTasks => decision.with_filter(task::task_predicate(subject, board, config)),
        _ => decision,
    }
}

/// Moves and reassignments on ownership-only boards are admin-only. Elsewhere
/// only admins, board owners and the task's creator may reassign.
fn restricted_change(
    config: &AuthzConfig,
    subject: &Subject<'_>,
    board: &Board,
    target: &Task,
    change: TaskChange,
) -> Option<String> {
    if subject.is_admin() || change == TaskChange::Fields {
        return None;
    }
    let user_id = &subject.identity.id;
    if config.is_ownership_only(board.kind) {
        return Some(format!("only admins may move or reassign tasks on board {}", board.key));
    }
    match change {
        TaskChange::Assign if !board.is_owner(user_id) && &target.creator_id != user_id => Some(format!(
            "only admins, board owners or the creator may reassign task {}",
            target.id
        )),
        _ => None,
    }
}

fn decide_access_action(subject: &Subject<'_>, action: Action<'_>, groups: &[Group]) -> Decision {
    if subject.is_admin() {
        return Decision::allow().with_grant(Some(BoardGrant::AdminOverride));
    }
    match action {
        Action::ManageGroup(group_id) => {
            let leads = groups
                .iter()
                .find(|g| g.id == group_id)
                .map(|g| g.is_active && g.lead_user_id.as_ref() == Some(&subject.identity.id))
                .unwrap_or(false);
            if leads {
                Decision::allow()
            } else {
                Decision::deny(
                    DenyReason::ForbiddenAction,
                    format!("not the lead of active group {group_id}"),
                )
            }
        }
        _ => Decision::deny(DenyReason::ForbiddenAction, format!("{} requires an admin role", action.name())),
    }
}

/// Entry point used by request handlers.
///
/// Fetches a fresh binding and group snapshot on every call and never caches
/// across calls.
#[derive(Clone)]
pub struct AuthorizationGuard {
    config: Arc<AuthzConfig>,
    resolver: RoleBindingResolver,
    groups: Arc<dyn GroupStore>,
    audit: Option<AuditBus>,
}

impl AuthorizationGuard {
    pub fn new(config: AuthzConfig, bindings: Arc<dyn RoleBindingStore>, groups: Arc<dyn GroupStore>) -> Self {
        let resolver = RoleBindingResolver::new(bindings, config.department_scope);
        Self {
            config: Arc::new(config),
            resolver,
            groups,
            audit: None,
        }
    }

    pub fn with_audit(mut self, bus: AuditBus) -> Self {
        self.audit = Some(bus);
        self
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    async fn active_groups(&self, identity: &Identity) -> Vec<Group> {
        match self.groups.groups_for(identity).await {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(user_id = %identity.id, error = %err, "group store unavailable, ignoring group grants");
                Vec::new()
            }
        }
    }

    async fn load(&self, identity: &Identity, action: Action<'_>) -> (BindingSnapshot, Vec<Group>) {
        let bindings = self.resolver.snapshot(identity).await;
        let mut groups = self.active_groups(identity).await;
        if let Action::ManageGroup(group_id) = action {
            if !groups.iter().any(|g| g.id == group_id) {
                match self.groups.group(group_id).await {
                    Ok(Some(group)) => groups.push(group),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(group_id = %group_id, error = %err, "group lookup failed"),
                }
            }
        }
        (bindings, groups)
    }

    fn subject<'a>(&self, identity: &'a Identity, bindings: &BindingSnapshot, groups: &[Group], ctx: &BindingContext) -> Subject<'a> {
        let roles = bindings.effective_roles(identity, ctx, self.config.department_scope);
        Subject::new(identity, roles, ActiveGroups::resolve(identity, groups), &self.config)
    }

    /// Effective roles of `identity` in `ctx`, resolved from a fresh snapshot.
    pub async fn effective_roles(&self, identity: &Identity, ctx: &BindingContext) -> EffectiveRoles {
        self.resolver.resolve(identity, ctx).await
    }

    pub async fn authorize(&self, identity: Option<&Identity>, action: Action<'_>, board: Option<&Board>) -> Decision {
        let decision = self.authorize_inner(identity, action, board).await;

        tracing::debug!(
            user_id = identity.map(|i| i.id.as_str()).unwrap_or("-"),
            action = action.name(),
            board = board.map(|b| b.key.as_str()).unwrap_or("-"),
            allow = decision.allow,
            reason = decision.reason.map(|r| r.as_str()).unwrap_or("-"),
            degraded = decision.degraded,
            "authorization decision"
        );

        if let Some(bus) = &self.audit {
            let record = DecisionRecord::new(identity.map(|i| i.id.clone()), action.name(), board.map(|b| b.key.clone()), &decision);
            publish_decision(bus, &record);
        }

        decision
    }

    async fn authorize_inner(&self, identity: Option<&Identity>, action: Action<'_>, board: Option<&Board>) -> Decision {
        let Some(identity) = identity else {
            return Decision::deny(DenyReason::Unauthenticated, "no verified principal");
        };
        if let Err(err) = identity.validate() {
            return Decision::deny(DenyReason::Unauthenticated, err.to_string());
        }

        let (bindings, groups) = self.load(identity, action).await;
        let ctx = board.map(BindingContext::for_board).unwrap_or_default();
        let subject = self.subject(identity, &bindings, &groups, &ctx);

        decide(&self.config, &subject, action, board, &groups)
    }

    /// Task filter for `board`, or the denial if the board itself is not visible.
    pub async fn task_predicate(&self, identity: &Identity, board: &Board) -> Result<TaskFilter, AccessError> {
        let decision = self.authorize(Some(identity), Action::ListTasks, Some(board)).await;
        match decision.into_result()? {
            Some(filter) => Ok(filter),
            None => Err(AccessError::forbidden(DenyReason::ForbiddenBoard.as_str())),
        }
    }

    /// Boards `identity` can see, each evaluated with its own binding context.
    pub async fn visible_boards<'b>(&self, identity: &Identity, boards: &'b [Board]) -> Vec<(&'b Board, BoardGrant)> {
        if identity.validate().is_err() {
            return Vec::new();
        }
        let (bindings, groups) = self.load(identity, Action::ViewBoard).await;
        board::visible_boards(boards, |b| self.subject(identity, &bindings, &groups, &BindingContext::for_board(b)))
    }
}
