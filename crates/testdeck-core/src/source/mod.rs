//! Data source boundary.
//!
//! The engine never queries storage directly. A [`DataSource`] returns the
//! records of one kind that fall inside a [`RecordScope`] and that the caller
//! is allowed to see; permission scoping lives behind this trait.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dimension::Dimensioned;
use crate::error::ReportResult;
use crate::model::{
    CaseRecord, ExecutionRecord, IssueRecord, MilestoneRecord, RunRecord, SessionRecord,
};

pub use memory::{Dataset, MemorySource};

/// Project and time window a query is limited to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScope {
    /// `None` means every project the caller can access.
    pub project_id: Option<String>,
    /// Inclusive.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive.
    pub end: Option<DateTime<Utc>>,
}

impl RecordScope {
    pub fn new(
        project_id: Option<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            project_id,
            start,
            end,
        }
    }

    pub fn cross_project() -> Self {
        Self::default()
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }

    /// Whether a record falls inside this scope.
    pub fn contains<R: Dimensioned>(&self, record: &R) -> bool {
        self.project_id
            .as_deref()
            .map_or(true, |p| record.project().id == p)
            && self.contains_instant(record.timestamp())
    }
}

/// Read access to report records.
///
/// Errors are surfaced to the caller unchanged; the engine never retries.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn project_exists(&self, project_id: &str) -> ReportResult<bool>;

    async fn executions(&self, scope: &RecordScope) -> ReportResult<Vec<ExecutionRecord>>;

    async fn runs(&self, scope: &RecordScope) -> ReportResult<Vec<RunRecord>>;

    async fn cases(&self, scope: &RecordScope) -> ReportResult<Vec<CaseRecord>>;

    async fn sessions(&self, scope: &RecordScope) -> ReportResult<Vec<SessionRecord>>;

    async fn issues(&self, scope: &RecordScope) -> ReportResult<Vec<IssueRecord>>;

    /// Includes deleted milestones; calculators drop them.
    async fn milestones(&self, scope: &RecordScope) -> ReportResult<Vec<MilestoneRecord>>;
}
