//! In-memory data source backed by a JSON dataset.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataSource, RecordScope};
use crate::dimension::Dimensioned;
use crate::error::{ReportError, ReportResult};
use crate::model::{
    CaseRecord, EntityRef, ExecutionRecord, IssueRecord, MilestoneRecord, RunRecord,
    SessionRecord,
};

/// Snapshot of every record a report may read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub projects: Vec<EntityRef>,
    pub executions: Vec<ExecutionRecord>,
    pub runs: Vec<RunRecord>,
    pub cases: Vec<CaseRecord>,
    pub sessions: Vec<SessionRecord>,
    pub issues: Vec<IssueRecord>,
    pub milestones: Vec<MilestoneRecord>,
}

impl Dataset {
    pub fn from_json(raw: &str) -> ReportResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ReportError::upstream(format!("invalid dataset: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> ReportResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::upstream(format!("failed to read dataset {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

/// [`DataSource`] over a [`Dataset`]. Every record is visible.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    dataset: Dataset,
}

impl MemorySource {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }
}

fn scoped<R: Dimensioned + Clone>(records: &[R], scope: &RecordScope) -> Vec<R> {
    records
        .iter()
        .filter(|r| scope.contains(*r))
        .cloned()
        .collect()
}

#[async_trait]
impl DataSource for MemorySource {
    async fn project_exists(&self, project_id: &str) -> ReportResult<bool> {
        Ok(self.dataset.projects.iter().any(|p| p.id == project_id))
    }

    async fn executions(&self, scope: &RecordScope) -> ReportResult<Vec<ExecutionRecord>> {
        let out = scoped(&self.dataset.executions, scope);
        debug!(records = out.len(), "memory source: executions");
        Ok(out)
    }

    async fn runs(&self, scope: &RecordScope) -> ReportResult<Vec<RunRecord>> {
        Ok(scoped(&self.dataset.runs, scope))
    }

    async fn cases(&self, scope: &RecordScope) -> ReportResult<Vec<CaseRecord>> {
        Ok(scoped(&self.dataset.cases, scope))
    }

    async fn sessions(&self, scope: &RecordScope) -> ReportResult<Vec<SessionRecord>> {
        Ok(scoped(&self.dataset.sessions, scope))
    }

    async fn issues(&self, scope: &RecordScope) -> ReportResult<Vec<IssueRecord>> {
        Ok(scoped(&self.dataset.issues, scope))
    }

    async fn milestones(&self, scope: &RecordScope) -> ReportResult<Vec<MilestoneRecord>> {
        Ok(scoped(&self.dataset.milestones, scope))
    }
}
