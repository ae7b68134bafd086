//! Structured events pushed to the reporter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::repository::RepositoryState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Closed vocabulary of event codes.
///
/// Outcome classification depends on the family a code belongs to, see
/// [`EventCode::family`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCode {
    RemoteUpdated,
    ProtocolConverted,
    FolderRenamed,
    TaskApplied,
    ActionApplied,
    OperationPlanned,
    TaskPlanned,
    ActionPlanned,
    UserDeclined,
    RepositorySkipped,
    StepSkipped,
    TaskSkipped,
    ActionSkipped,
    NoChanges,
    OperationFailed,
    AuditReport,
    StepSummary,
}

/// How a code participates in outcome classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFamily {
    Applied,
    Declined,
    Skip,
    NoOp,
    Error,
    Informational,
    Summary,
}

impl EventCode {
    pub fn as_str(self) -> &'static str {
        match self {
            EventCode::RemoteUpdated => "remote_updated",
            EventCode::ProtocolConverted => "protocol_converted",
            EventCode::FolderRenamed => "folder_renamed",
            EventCode::TaskApplied => "task_applied",
            EventCode::ActionApplied => "action_applied",
            EventCode::OperationPlanned => "operation_planned",
            EventCode::TaskPlanned => "task_planned",
            EventCode::ActionPlanned => "action_planned",
            EventCode::UserDeclined => "user_declined",
            EventCode::RepositorySkipped => "repository_skipped",
            EventCode::StepSkipped => "step_skipped",
            EventCode::TaskSkipped => "task_skipped",
            EventCode::ActionSkipped => "action_skipped",
            EventCode::NoChanges => "no_changes",
            EventCode::OperationFailed => "operation_failed",
            EventCode::AuditReport => "audit_report",
            EventCode::StepSummary => "step_summary",
        }
    }

    pub fn family(self) -> CodeFamily {
        match self {
            EventCode::RemoteUpdated
            | EventCode::ProtocolConverted
            | EventCode::FolderRenamed
            | EventCode::TaskApplied
            | EventCode::ActionApplied => CodeFamily::Applied,
            EventCode::UserDeclined => CodeFamily::Declined,
            EventCode::RepositorySkipped
            | EventCode::StepSkipped
            | EventCode::TaskSkipped
            | EventCode::ActionSkipped => CodeFamily::Skip,
            EventCode::NoChanges => CodeFamily::NoOp,
            EventCode::OperationFailed => CodeFamily::Error,
            EventCode::OperationPlanned
            | EventCode::TaskPlanned
            | EventCode::ActionPlanned
            | EventCode::AuditReport => CodeFamily::Informational,
            EventCode::StepSummary => CodeFamily::Summary,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub level: EventLevel,
    pub code: EventCode,
    /// `owner/name` of the repository, when the event concerns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_path: Option<PathBuf>,
    /// Step the event was emitted under; filled in by the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(level: EventLevel, code: EventCode, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            repository: None,
            repository_path: None,
            step: None,
            message: message.into(),
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(code: EventCode, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, code, message)
    }

    pub fn warn(code: EventCode, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Warn, code, message)
    }

    pub fn error(code: EventCode, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, code, message)
    }

    pub fn for_repository(mut self, repository: &RepositoryState) -> Self {
        self.repository = Some(repository.identifier());
        self.repository_path = Some(repository.path.clone());
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}
