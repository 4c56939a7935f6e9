use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// The closed set of business event categories the relay understands,
/// plus a fallback for anything else arriving on the wire. Keeping the
/// switch exhaustive here means adding a kind forces every match site
/// (gate, renderer) to be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    DateRequest,
    PatientStatus,
    ProductionSummary,
    Unknown(String),
}

impl NotificationKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "date_request" => NotificationKind::DateRequest,
            "patient_status" => NotificationKind::PatientStatus,
            "production_summary" => NotificationKind::ProductionSummary,
            other => NotificationKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::DateRequest => "date_request",
            NotificationKind::PatientStatus => "patient_status",
            NotificationKind::ProductionSummary => "production_summary",
            NotificationKind::Unknown(other) => other,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-office notification preferences, owned and mutated outside this
/// service. Fetched fresh for every event so the gate always reflects
/// the latest stored flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub office_id: i64,
    pub recipient_emails: Vec<String>,
    #[serde(default)]
    pub notify_on_date_request: bool,
    #[serde(default)]
    pub notify_on_patient_status: bool,
    #[serde(default)]
    pub notify_on_production_summary: bool,
}

impl NotificationSettings {
    /// Preference gate: maps a notification kind to its enable flag.
    /// Unknown kinds are always disabled. A `false` here is a valid
    /// terminal outcome, not an error.
    pub fn is_enabled(&self, kind: &NotificationKind) -> bool {
        match kind {
            NotificationKind::DateRequest => self.notify_on_date_request,
            NotificationKind::PatientStatus => self.notify_on_patient_status,
            NotificationKind::ProductionSummary => self.notify_on_production_summary,
            NotificationKind::Unknown(_) => false,
        }
    }
}

/// One inbound notification, created at ingress and consumed
/// synchronously. Never persisted, queued, or retried.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Correlation id for log lines across the processing pipeline.
    pub id: Uuid,
    pub office_id: i64,
    pub kind: NotificationKind,
    pub data: Value,
}

impl NotificationEvent {
    pub fn new(office_id: i64, kind: NotificationKind, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            office_id,
            kind,
            data,
        }
    }
}

/// Subject plus HTML body, rendered once per event and sent identically
/// to every recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Successful terminal outcomes of one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The kind was disabled for the office; nothing was sent.
    Suppressed,
    /// All recipients were dispatched to.
    Sent { recipients: usize },
}
