use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tempfile::NamedTempFile;

use board_access::authz::{Action, AuthorizationGuard, BoardGrant, DenyReason};
use board_access::config::AuthzConfig;
use board_access::store::{MemoryStore, Snapshot};

fn write_snapshot(value: &serde_json::Value) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(value.to_string().as_bytes())?;
    Ok(file)
}

fn demo() -> serde_json::Value {
    json!({
        "identities": [
            { "id": "ceo", "roles": ["CEO"], "departments": ["ADMINS"] },
            { "id": "buyer", "roles": ["buyer"], "group_ids": ["design-sync"], "departments": ["gambling"] },
            { "id": "lead", "roles": ["head"], "departments": ["GAMBLING"] }
        ],
        "bindings": [
            { "user_id": "lead", "role": "Department Head", "scope": { "kind": "department", "value": "GAMBLING" } },
            { "user_id": "buyer", "role": "designer", "scope": { "kind": "board", "value": "GAM_DES" }, "is_active": false }
        ],
        "groups": [
            { "id": "design-sync", "name": "Design sync", "lead_user_id": "lead", "member_ids": [] }
        ],
        "boards": [
            { "key": "GAM_BUY", "name": "Gambling buyers", "kind": "tasks", "allowed_roles": ["buyer", "team_lead"],
              "visible_departments": ["GAMBLING"], "default_department": "GAMBLING" },
            { "key": "GAM_DES", "name": "Gambling design", "kind": "tasks", "visibility_mode": "groups",
              "allowed_group_ids": ["design-sync"] },
            { "key": "EXP", "name": "Expenses", "kind": "expenses", "allowed_roles": ["buyer"] }
        ],
        "tasks": [
            { "id": "1", "board_key": "GAM_BUY", "title": "Launch", "creator_id": "buyer", "department": "GAMBLING" },
            { "id": "2", "board_key": "GAM_BUY", "title": "Budget", "creator_id": "lead", "department": "GAMBLING" },
            { "id": "3", "board_key": "GAM_BUY", "title": "Hire", "creator_id": "ceo", "department": "SWEEPS" }
        ]
    })
}

#[tokio::test]
async fn snapshot_file_drives_decisions() -> Result<()> {
    let file = write_snapshot(&demo())?;
    let snapshot = Snapshot::load(file.path())?;
    assert_eq!(snapshot.boards.len(), 3);

    let store = Arc::new(MemoryStore::from_snapshot(&snapshot));
    let guard = AuthorizationGuard::new(AuthzConfig::default(), store.clone(), store);

    let buyer = snapshot.identity("buyer").expect("buyer in snapshot");
    let visible: Vec<(&str, BoardGrant)> = guard
        .visible_boards(buyer, &snapshot.boards)
        .await
        .into_iter()
        .map(|(b, g)| (b.key.as_str(), g))
        .collect();
    assert_eq!(
        visible,
        vec![
            ("GAM_BUY", BoardGrant::Role("buyer".into())),
            ("GAM_DES", BoardGrant::Group("design-sync".into())),
            ("EXP", BoardGrant::Role("buyer".into())),
        ]
    );

    let board = snapshot.board("GAM_BUY").expect("board in snapshot");
    let filter = guard.task_predicate(buyer, board).await?;
    let ids: Vec<&str> = filter.apply(snapshot.tasks_on("GAM_BUY")).into_iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1"]);

    // "head" is a team lead; the department binding adds department_head for GAMBLING requests.
    let lead = snapshot.identity("lead").expect("lead in snapshot");
    let filter = guard.task_predicate(lead, board).await?;
    let ids: Vec<&str> = filter.apply(snapshot.tasks_on("GAM_BUY")).into_iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let ceo = snapshot.identity("ceo").expect("ceo in snapshot");
    let filter = guard.task_predicate(ceo, board).await?;
    assert_eq!(filter.apply(snapshot.tasks_on("GAM_BUY")).len(), 3);
    Ok(())
}

#[tokio::test]
async fn group_lead_manages_own_group_only() -> Result<()> {
    let snapshot = Snapshot::from_json_str(&demo().to_string())?;
    let store = Arc::new(MemoryStore::from_snapshot(&snapshot));
    let guard = AuthorizationGuard::new(AuthzConfig::default(), store.clone(), store.clone());

    let lead = snapshot.identity("lead").expect("lead in snapshot");
    assert!(guard.authorize(Some(lead), Action::ManageGroup("design-sync"), None).await.allow);

    let buyer = snapshot.identity("buyer").expect("buyer in snapshot");
    let denied = guard.authorize(Some(buyer), Action::ManageGroup("design-sync"), None).await;
    assert_eq!(denied.reason, Some(DenyReason::ForbiddenAction));

    store.set_group_active("design-sync", false).await;
    let denied = guard.authorize(Some(lead), Action::ManageGroup("design-sync"), None).await;
    assert_eq!(denied.reason, Some(DenyReason::ForbiddenAction));
    Ok(())
}

#[test]
fn malformed_snapshot_names_the_field() {
    let raw = r#"{ "bindings": [ { "user_id": "u1", "role": "buyer", "scope": { "kind": "planet" } } ] }"#;
    let err = Snapshot::from_json_str(raw).unwrap_err();
    assert!(err.to_string().contains("bindings[0].scope.kind"), "{err}");
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Snapshot::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read snapshot"));
}
