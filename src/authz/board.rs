use serde::Serialize;

use super::canonical::CanonicalRole;
use super::subject::Subject;
use crate::models::Board;

/// Which visibility mode let the subject in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", content = "value", rename_all = "snake_case")]
pub enum BoardGrant {
    AdminOverride,
    Role(CanonicalRole),
    Group(String),
    Member,
    Owner,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenReason {
    /// No role, group, member, owner or public match.
    NoMatch,
    /// A mode matched, but none of the subject's departments is visible.
    DepartmentVeto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardVerdict {
    Visible(BoardGrant),
    Hidden(HiddenReason),
    /// The board's visibility settings cannot be evaluated; treated as hidden.
    Misconfigured(String),
}

impl BoardVerdict {
    pub fn is_visible(&self) -> bool {
        matches!(self, BoardVerdict::Visible(_))
    }
}

/// Kinds of board mutation a caller may ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    CreateTask,
    EditTask,
    ManageBoard,
}

fn match_mode(subject: &Subject<'_>, board: &Board) -> Option<BoardGrant> {
    if let Some(role) = subject.first_role_in(&board.allowed_roles) {
        return Some(BoardGrant::Role(role.clone()));
    }
    if let Some(group) = subject.groups.first_shared(&board.allowed_group_ids) {
        return Some(BoardGrant::Group(group.to_string()));
    }
    let user_id = &subject.identity.id;
    if board.is_owner(user_id) {
        return Some(BoardGrant::Owner);
    }
    if board.is_member(user_id) {
        return Some(BoardGrant::Member);
    }
    if board.public {
        return Some(BoardGrant::Public);
    }
    None
}

/// Decides whether `subject` may see `board`.
///
/// Order:
/// 1. invalid visibility settings -> misconfigured (deny)
/// 2. admin override -> visible
/// 3. role, group, member/owner, public modes (any one suffices)
/// 4. department veto when the board restricts departments
pub fn evaluate(subject: &Subject<'_>, board: &Board) -> BoardVerdict {
    let user_id = &subject.identity.id;

    if let Err(err) = board.validate_visibility() {
        tracing::error!(user_id = %user_id, board = %board.key, error = %err, "board visibility misconfigured");
        return BoardVerdict::Misconfigured(err.to_string());
    }

    if subject.is_admin() {
        tracing::debug!(user_id = %user_id, board = %board.key, "admin override");
        return BoardVerdict::Visible(BoardGrant::AdminOverride);
    }

    let Some(grant) = match_mode(subject, board) else {
        tracing::debug!(user_id = %user_id, board = %board.key, "no visibility mode matched");
        return BoardVerdict::Hidden(HiddenReason::NoMatch);
    };

    if !board.visible_departments.is_empty() && !subject.identity.in_any_department(&board.visible_departments) {
        tracing::debug!(
            user_id = %user_id,
            board = %board.key,
            grant = ?grant,
            "department veto"
        );
        return BoardVerdict::Hidden(HiddenReason::DepartmentVeto);
    }

    tracing::debug!(user_id = %user_id, board = %board.key, grant = ?grant, "board visible");
    BoardVerdict::Visible(grant)
}

pub fn can_see_board(subject: &Subject<'_>, board: &Board) -> bool {
    evaluate(subject, board).is_visible()
}

/// Visible, not archived, and either owned or opened up by the board's permissions.
pub fn can_write_board(subject: &Subject<'_>, board: &Board, kind: WriteKind) -> bool {
    match evaluate(subject, board) {
        BoardVerdict::Visible(BoardGrant::AdminOverride) => true,
        BoardVerdict::Visible(_) => {
            if board.is_archived {
                return false;
            }
            if board.is_owner(&subject.identity.id) {
                return true;
            }
            match kind {
                WriteKind::CreateTask => board.permissions.create,
                WriteKind::EditTask => board.permissions.edit,
                WriteKind::ManageBoard => board.permissions.manage,
            }
        }
        _ => false,
    }
}

/// Boards among `boards` that `subject_for` (built per board) can see.
pub fn visible_boards<'b, 's, F>(boards: &'b [Board], mut subject_for: F) -> Vec<(&'b Board, BoardGrant)>
where
    F: FnMut(&Board) -> Subject<'s>,
{
    boards
        .iter()
        .filter_map(|board| match evaluate(&subject_for(board), board) {
            BoardVerdict::Visible(grant) => Some((board, grant)),
            _ => None,
        })
        .collect()
}
