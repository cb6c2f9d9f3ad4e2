use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use board_access::authz::{canonicalize, Action, AuthorizationGuard, BindingContext, TaskChange};
use board_access::config::AuthzConfig;
use board_access::events;
use board_access::store::{MemoryStore, Snapshot};

#[derive(Parser, Debug)]
#[command(author, version, about = "board-access decision tool", long_about = None)]
struct Cli {
    /// Publish every decision to the audit log
    #[arg(long, global = true)]
    audit: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the canonical form of each role
    Canonicalize { roles: Vec<String> },
    /// Effective roles of a user, optionally within a board or department context
    Roles {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        board: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
    /// Boards a user can see, with the mode that granted each
    Boards {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Tasks of a board visible to a user
    Tasks {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        board: String,
    },
    /// Full authorization decision for one action
    Check {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        action: ActionArg,
        #[arg(long)]
        board: Option<String>,
        /// Task id for edit-task, move-task and assign-task
        #[arg(long)]
        task: Option<String>,
        /// Group id for manage-group
        #[arg(long)]
        group: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    ViewBoard,
    ListTasks,
    CreateTask,
    EditTask,
    MoveTask,
    AssignTask,
    ManageBoard,
    ManageGroup,
    ManageAccess,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = AuthzConfig::from_env()?;

    let (audit, listener) = if cli.audit {
        let (bus, rx) = events::init_audit_bus();
        (Some(bus), Some(tokio::spawn(events::start_audit_listener(rx))))
    } else {
        (None, None)
    };

    let output = match cli.command {
        Commands::Canonicalize { roles } => {
            let pairs: Vec<_> = roles
                .iter()
                .map(|raw| json!({ "raw": raw, "canonical": canonicalize(raw) }))
                .collect();
            json!(pairs)
        }
        Commands::Roles { snapshot, user, board, department } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let guard = build_guard(config, &snapshot, audit.clone());
            let identity = snapshot
                .identity(&user)
                .with_context(|| format!("user {user} not in snapshot"))?;

            let mut ctx = match board.as_deref().and_then(|key| snapshot.board(key)) {
                Some(b) => BindingContext::for_board(b),
                None => BindingContext::new(),
            };
            if let Some(key) = board {
                ctx.board_key = Some(key);
            }
            if let Some(dept) = department {
                ctx = ctx.with_department(dept);
            }

            let roles = guard.effective_roles(identity, &ctx).await;
            json!({ "user": user, "roles": roles.roles, "degraded": roles.degraded })
        }
        Commands::Boards { snapshot, user } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let guard = build_guard(config, &snapshot, audit.clone());
            let identity = snapshot
                .identity(&user)
                .with_context(|| format!("user {user} not in snapshot"))?;

            let boards: Vec<_> = guard
                .visible_boards(identity, &snapshot.boards)
                .await
                .into_iter()
                .map(|(board, grant)| json!({ "key": board.key, "name": board.name, "grant": grant }))
                .collect();
            json!(boards)
        }
        Commands::Tasks { snapshot, user, board } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let guard = build_guard(config, &snapshot, audit.clone());
            let identity = snapshot
                .identity(&user)
                .with_context(|| format!("user {user} not in snapshot"))?;
            let target = snapshot
                .board(&board)
                .with_context(|| format!("board {board} not in snapshot"))?;

            let filter = guard.task_predicate(identity, target).await?;
            let tasks = filter.apply(snapshot.tasks_on(&board));
            json!({ "filter": filter, "tasks": tasks })
        }
        Commands::Check { snapshot, user, action, board, task, group } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let guard = build_guard(config, &snapshot, audit.clone());
            // An unknown user is evaluated as an unauthenticated request.
            let identity = snapshot.identity(&user);
            let target = match board.as_deref() {
                Some(key) => Some(snapshot.board(key).with_context(|| format!("board {key} not in snapshot"))?),
                None => None,
            };
            let task = match task.as_deref() {
                Some(id) => Some(
                    snapshot
                        .tasks
                        .iter()
                        .find(|t| t.id == id)
                        .with_context(|| format!("task {id} not in snapshot"))?,
                ),
                None => None,
            };

            let action = match action {
                ActionArg::ViewBoard => Action::ViewBoard,
                ActionArg::ListTasks => Action::ListTasks,
                ActionArg::CreateTask => Action::CreateTask,
                ActionArg::EditTask | ActionArg::MoveTask | ActionArg::AssignTask => {
                    let change = match action {
                        ActionArg::MoveTask => TaskChange::Move,
                        ActionArg::AssignTask => TaskChange::Assign,
                        _ => TaskChange::Fields,
                    };
                    let task = task.context("--task is required for task edits")?;
                    Action::EditTask { task, change }
                }
                ActionArg::ManageBoard => Action::ManageBoard,
                ActionArg::ManageGroup => {
                    Action::ManageGroup(group.as_deref().context("--group is required for manage-group")?)
                }
                ActionArg::ManageAccess => Action::ManageAccess,
            };

            let decision = guard.authorize(identity, action, target).await;
            serde_json::to_value(&decision)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    // The listener exits once the last sender is gone.
    drop(audit);
    if let Some(listener) = listener {
        let _ = listener.await;
    }
    Ok(())
}

fn build_guard(config: AuthzConfig, snapshot: &Snapshot, audit: Option<events::AuditBus>) -> AuthorizationGuard {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot));
    let guard = AuthorizationGuard::new(config, store.clone(), store);
    match audit {
        Some(bus) => guard.with_audit(bus),
        None => guard,
    }
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    // Decisions go to stdout; logs stay on stderr.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
