use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

use crate::authz::{Decision, DenyReason};
use crate::models::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub subject_id: Option<String>,
    pub severity: Severity,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: String, subject_id: Option<String>, severity: Severity, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            subject_id,
            severity,
            payload,
        }
    }
}

pub type AuditBus = broadcast::Sender<Value>;

pub fn init_audit_bus() -> (AuditBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// One authorization decision as published for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub degraded: bool,
}

impl DecisionRecord {
    pub fn new(user_id: Option<UserId>, action: &str, board: Option<String>, decision: &Decision) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            board,
            allow: decision.allow,
            reason: decision.reason.map(|r| r.as_str().to_string()),
            detail: decision.detail.clone(),
            degraded: decision.degraded,
        }
    }
}

impl Loggable for DecisionRecord {
    fn entity_type() -> &'static str {
        "decision"
    }

    fn subject_id(&self) -> Option<String> {
        self.user_id.as_ref().map(|u| u.to_string())
    }

    fn outcome(&self) -> &'static str {
        if self.allow {
            "allowed"
        } else {
            "denied"
        }
    }

    fn severity(&self) -> Severity {
        match self.reason.as_deref() {
            Some(r) if r == DenyReason::ConfigurationError.as_str() => Severity::Critical,
            Some(_) => Severity::Important,
            None if self.degraded => Severity::Important,
            None => Severity::Noise,
        }
    }
}

/// Publishes `record` on the bus. Audit failures never affect the decision.
pub fn publish<T: Loggable>(bus: &AuditBus, record: &T) {
    let name = format!("{}.{}", T::entity_type(), record.outcome());
    let payload = serde_json::to_value(record).unwrap_or_default();
    let event = DomainEvent::new(name, record.subject_id(), record.severity(), payload);

    // No receivers is fine; the bus is optional observability.
    let _ = bus.send(serde_json::to_value(event).unwrap_or_default());
}

pub fn publish_decision(bus: &AuditBus, record: &DecisionRecord) {
    publish(bus, record);
}

/// Drains the bus into the log until every sender is dropped.
pub async fn start_audit_listener(mut rx: broadcast::Receiver<Value>) {
    tracing::info!("audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
        let subject = event.get("subject_id").and_then(|v| v.as_str()).unwrap_or("-");
        let severity = event.get("severity").and_then(|v| v.as_str()).unwrap_or("important");
        let payload = event.get("payload").cloned().unwrap_or_default();

        match severity {
            "critical" => tracing::error!(event = name, user_id = subject, payload = %payload, "audit"),
            "noise" => tracing::trace!(event = name, user_id = subject, payload = %payload, "audit"),
            _ => tracing::info!(event = name, user_id = subject, payload = %payload, "audit"),
        }
    }
    tracing::info!("audit listener stopped");
}
