//! Records read from the data source.
//!
//! Every record serializes all of its fields (optional ones as `null`) so the
//! variant-specific keys used by [`crate::drilldown::RecordKind::detect`] are
//! always present on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a named entity (project, run, case, milestone, configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Embedded user. `email` never survives public sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Execution status as configured in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub is_failure: bool,
}

impl StatusRef {
    pub fn passed() -> Self {
        Self {
            id: "passed".into(),
            name: "Passed".into(),
            is_success: true,
            is_failure: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            id: "failed".into(),
            name: "Failed".into(),
            is_success: false,
            is_failure: true,
        }
    }

    pub fn blocked() -> Self {
        Self {
            id: "blocked".into(),
            name: "Blocked".into(),
            is_success: false,
            is_failure: false,
        }
    }

    pub fn skipped() -> Self {
        Self {
            id: "skipped".into(),
            name: "Skipped".into(),
            is_success: false,
            is_failure: false,
        }
    }
}

/// One result of one test case inside a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    /// Title of the executed test case.
    pub name: String,
    pub project: EntityRef,
    pub test_run: EntityRef,
    pub test_case: EntityRef,
    #[serde(default)]
    pub milestone: Option<EntityRef>,
    #[serde(default)]
    pub configuration: Option<EntityRef>,
    pub status: StatusRef,
    #[serde(default)]
    pub executed_by: Option<UserRef>,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub elapsed_secs: Option<f64>,
}

impl ExecutionRecord {
    pub fn outcome(&self) -> ExecutionOutcome {
        ExecutionOutcome {
            is_success: self.status.is_success,
            is_failure: self.status.is_failure,
            executed_at: self.executed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub name: String,
    pub project: EntityRef,
    #[serde(default)]
    pub milestone: Option<EntityRef>,
    #[serde(default)]
    pub configuration: Option<EntityRef>,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub test_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub name: String,
    pub project: EntityRef,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub automated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub project: EntityRef,
    #[serde(default)]
    pub milestone: Option<EntityRef>,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub elapsed_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: String,
    pub name: String,
    /// Key in the external tracker (e.g. `PROJ-42`).
    pub external_id: String,
    pub status: String,
    #[serde(default)]
    pub is_closed: bool,
    pub project: EntityRef,
    #[serde(default)]
    pub creator: Option<UserRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRecord {
    pub id: String,
    pub name: String,
    pub project: EntityRef,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub is_started: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl MilestoneRecord {
    pub fn snapshot(&self) -> MilestoneSnapshot {
        MilestoneSnapshot {
            is_started: self.is_started,
            is_completed: self.is_completed,
            is_deleted: self.is_deleted,
        }
    }
}

/// Minimal milestone shape the calculators work on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneSnapshot {
    pub is_started: bool,
    pub is_completed: bool,
    pub is_deleted: bool,
}

impl MilestoneSnapshot {
    pub fn new(is_started: bool, is_completed: bool, is_deleted: bool) -> Self {
        Self {
            is_started,
            is_completed,
            is_deleted,
        }
    }

    pub fn has_progress(&self) -> bool {
        self.is_started || self.is_completed
    }

    pub fn is_active(&self) -> bool {
        self.is_started && !self.is_completed
    }
}

/// One chronological result for a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub is_success: bool,
    pub is_failure: bool,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn new(is_success: bool, is_failure: bool, executed_at: DateTime<Utc>) -> Self {
        Self {
            is_success,
            is_failure,
            executed_at,
        }
    }

    /// Blocked/skipped style results carry neither flag.
    pub fn is_definitive(&self) -> bool {
        self.is_success || self.is_failure
    }

    /// `Some(true)` for pass, `Some(false)` for fail, `None` when non-definitive.
    pub fn definitive(&self) -> Option<bool> {
        if self.is_success {
            Some(true)
        } else if self.is_failure {
            Some(false)
        } else {
            None
        }
    }
}
