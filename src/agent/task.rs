use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::browser::extract::ExtractedContent;

/// Kind of automation job a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Re-check a page the user asked to watch
    WatchCheck,

    /// Validate a page before it is surfaced elsewhere
    PreValidate,

    /// Follow-up visit on a page discovered through related links
    DeepDive,

    /// Explicitly requested by the user
    Manual,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::WatchCheck => "watch_check",
            TaskKind::PreValidate => "pre_validate",
            TaskKind::DeepDive => "deep_dive",
            TaskKind::Manual => "manual",
        }
    }
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::Manual
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown task kind '{0}' (expected watch_check, pre_validate, deep_dive or manual)")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "watch_check" => Ok(TaskKind::WatchCheck),
            "pre_validate" => Ok(TaskKind::PreValidate),
            "deep_dive" => Ok(TaskKind::DeepDive),
            "manual" => Ok(TaskKind::Manual),
            _ => Err(UnknownTaskKind(s.to_string())),
        }
    }
}

/// Lifecycle of a task. Transitions only move forward:
/// `Pending -> Processing -> Complete | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

/// What the caller supplies when enqueuing work
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// URL to visit
    pub url: String,

    /// Kind of job
    pub kind: TaskKind,

    /// Priority (higher values = more urgent)
    pub priority: i32,

    /// Arbitrary caller data, echoed back in the report
    pub metadata: Map<String, Value>,
}

impl NewTask {
    pub fn new(url: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            url: url.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A queued unit of automation work, owned by the task queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque identifier assigned at insertion
    pub id: String,

    /// URL to visit
    pub url: String,

    /// Kind of job
    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Priority (higher values = more urgent)
    pub priority: i32,

    /// Arbitrary caller data
    pub metadata: Map<String, Value>,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// When the task entered the queue
    pub added_at: DateTime<Utc>,

    /// When the task reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Extracted content on success
    pub result: Option<ExtractedContent>,

    /// Failure reason
    pub error: Option<String>,
}

impl Task {
    pub(crate) fn from_new(id: String, new: NewTask, added_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url: new.url,
            kind: new.kind,
            priority: new.priority,
            metadata: new.metadata,
            status: TaskStatus::Pending,
            added_at,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}
