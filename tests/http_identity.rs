use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::extract::{FromRef, Path, State};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use board_access::authz::{Action, AuthorizationGuard};
use board_access::config::AuthzConfig;
use board_access::jwt::{JwtConfig, VerifiedIdentity};
use board_access::models::{Board, Task};
use board_access::store::MemoryStore;
use board_access::AccessError;

const SECRET: &str = "test-secret";

#[derive(Clone)]
struct AppState {
    jwt: Arc<JwtConfig>,
    guard: AuthorizationGuard,
    boards: Arc<Vec<Board>>,
    tasks: Arc<Vec<Task>>,
}

impl FromRef<AppState> for Arc<JwtConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    VerifiedIdentity(identity): VerifiedIdentity,
    Path(key): Path<String>,
) -> Result<Json<Value>, AccessError> {
    let board = state
        .boards
        .iter()
        .find(|b| b.key == key)
        .ok_or_else(|| AccessError::forbidden("forbidden_board"))?;

    let decision = state.guard.authorize(Some(&identity), Action::ListTasks, Some(board)).await;
    let filter = decision
        .into_result()?
        .ok_or_else(|| AccessError::forbidden("forbidden_board"))?;

    let ids: Vec<&str> = filter.apply(state.tasks.iter()).into_iter().map(|t| t.id.as_str()).collect();
    Ok(Json(json!({ "board": key, "tasks": ids })))
}

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        jwt: Arc::new(JwtConfig::new(SECRET)),
        guard: AuthorizationGuard::new(AuthzConfig::default(), store.clone(), store),
        boards: Arc::new(vec![
            Board::new("GAM_BUY").with_allowed_roles(["buyer"]).with_visible_departments(["GAMBLING"]),
            Board::new("BROKEN").with_mode("sideways"),
        ]),
        tasks: Arc::new(vec![
            Task::new("1", "GAM_BUY", "u1"),
            Task::new("2", "GAM_BUY", "u2").with_assignee("u1"),
            Task::new("3", "GAM_BUY", "u2"),
        ]),
    };

    Router::new()
        .route("/boards/:key/tasks", get(list_tasks))
        .with_state(state)
}

fn token(departments: &[&str]) -> Result<String> {
    let claims = json!({
        "sub": "u1",
        "roles": ["Media Buyer"],
        "departments": departments,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "iat": chrono::Utc::now().timestamp(),
    });
    Ok(jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))?)
}

async fn get_tasks(uri: &str, bearer: Option<String>) -> Result<(StatusCode, Value)> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(t) = bearer {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    let resp: Response = app().oneshot(req.body(Body::empty())?).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn missing_token_is_401() -> Result<()> {
    let (status, body) = get_tasks("/boards/GAM_BUY/tasks", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
    Ok(())
}

#[tokio::test]
async fn token_signed_elsewhere_is_401() -> Result<()> {
    let forged = jsonwebtoken::encode(
        &Header::default(),
        &json!({"sub": "u1", "departments": ["GAMBLING"], "exp": chrono::Utc::now().timestamp() + 60, "iat": 0}),
        &EncodingKey::from_secret(b"other"),
    )?;
    let (status, body) = get_tasks("/boards/GAM_BUY/tasks", Some(forged)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token");
    Ok(())
}

#[tokio::test]
async fn own_tasks_are_listed() -> Result<()> {
    let (status, body) = get_tasks("/boards/GAM_BUY/tasks", Some(token(&["GAMBLING"])?)).await?;
    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
    assert_eq!(body["tasks"], json!(["1", "2"]));
    Ok(())
}

#[tokio::test]
async fn other_department_is_403() -> Result<()> {
    let (status, body) = get_tasks("/boards/GAM_BUY/tasks", Some(token(&["SWIP"])?)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    Ok(())
}

#[tokio::test]
async fn misconfigured_board_is_403_without_detail() -> Result<()> {
    let (status, body) = get_tasks("/boards/BROKEN/tasks", Some(token(&["GAMBLING"])?)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(!body["message"].as_str().unwrap_or_default().contains("sideways"));
    Ok(())
}
