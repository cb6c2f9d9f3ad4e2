use serde::{Deserialize, Serialize};

/// Severity of an audit record; drives the log level of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Misconfiguration that denies legitimate users until an operator acts.
    Critical,
    /// Denials.
    #[default]
    Important,
    /// Routine allows.
    Noise,
}

/// Records that can be published on the audit bus.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. `decision` in `decision.denied`.
    fn entity_type() -> &'static str;

    /// The user the record is about, if known.
    fn subject_id(&self) -> Option<String>;

    /// Outcome suffix of the event name.
    fn outcome(&self) -> &'static str;

    fn severity(&self) -> Severity {
        Severity::Important
    }
}
