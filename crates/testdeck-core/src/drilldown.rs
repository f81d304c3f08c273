//! Drill-down: the individual records behind one report cell.
//!
//! The clicked cell's dimension values become equality constraints and are
//! matched through [`Dimensioned`], the same accessor aggregation groups
//! with, so the drilled set is exactly what was counted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aggregate::Activity;
use crate::config::EngineConfig;
use crate::dimension::{bucket_end, DimensionValue, Dimensioned};
use crate::error::{ReportError, ReportResult, ValidationErrors};
use crate::metrics::{self, StatusCount};
use crate::model::{
    CaseRecord, ExecutionOutcome, ExecutionRecord, IssueRecord, MilestoneRecord, RunRecord,
    SessionRecord,
};
use crate::request::{DateGrouping, Dimension, Metric, ReportFamily, ReportType};
use crate::source::{DataSource, RecordScope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    #[default]
    Project,
    CrossProject,
}

/// The clicked cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownContext {
    pub metric_id: Metric,
    #[serde(default)]
    pub metric_label: String,
    #[serde(default)]
    pub metric_value: Value,
    pub report_type: ReportType,
    #[serde(default)]
    pub mode: ReportMode,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<Dimension, DimensionValue>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_grouping: DateGrouping,
}

impl DrillDownContext {
    pub fn new(report_type: ReportType, metric: Metric) -> Self {
        Self {
            metric_id: metric,
            metric_label: metric.label().to_owned(),
            metric_value: Value::Null,
            report_type,
            mode: if report_type.is_cross_project() {
                ReportMode::CrossProject
            } else {
                ReportMode::Project
            },
            project_id: None,
            dimensions: BTreeMap::new(),
            start_date: None,
            end_date: None,
            date_grouping: DateGrouping::default(),
        }
    }

    pub fn from_json(raw: &str) -> ReportResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ReportError::from(ValidationErrors::single(
                "context",
                format!("Malformed drill-down context: {e}"),
            ))
        })
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension, value: DimensionValue) -> Self {
        self.dimensions.insert(dimension, value);
        self
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_date_grouping(mut self, grouping: DateGrouping) -> Self {
        self.date_grouping = grouping;
        self
    }

    /// Project constraint actually applied. Absent `projectId` means cross-project.
    pub fn scoped_project(&self) -> Option<&str> {
        match self.mode {
            ReportMode::Project if !self.report_type.is_cross_project() => {
                self.project_id.as_deref()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Execution,
    Run,
    Case,
    Session,
    Issue,
    Milestone,
}

impl RecordKind {
    /// Kind of record a metric of a report counts.
    pub fn for_metric(report_type: ReportType, metric: Metric) -> Self {
        match report_type.family() {
            ReportFamily::Execution | ReportFamily::Flaky => Self::Execution,
            ReportFamily::UserEngagement => match metric {
                Metric::TestsCreated => Self::Case,
                Metric::SessionsCreated => Self::Session,
                _ => Self::Execution,
            },
            ReportFamily::ProjectHealth => Self::Milestone,
            ReportFamily::RunSummary => Self::Run,
            ReportFamily::Repository => Self::Case,
            ReportFamily::Sessions => Self::Session,
            ReportFamily::Issues => Self::Issue,
        }
    }

    /// Discriminate a serialized record by its variant-specific keys.
    pub fn detect(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let has = |key: &str| obj.contains_key(key);
        if has("testRun") && has("executedAt") {
            Some(Self::Execution)
        } else if has("testCount") {
            Some(Self::Run)
        } else if has("externalId") {
            Some(Self::Issue)
        } else if has("isStarted") {
            Some(Self::Milestone)
        } else if has("assignedTo") {
            Some(Self::Session)
        } else if has("automated") {
            Some(Self::Case)
        } else {
            None
        }
    }
}

/// One drilled record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DrillDownRecord {
    Execution(ExecutionRecord),
    Run(RunRecord),
    Case(CaseRecord),
    Session(SessionRecord),
    Issue(IssueRecord),
    Milestone(MilestoneRecord),
}

impl DrillDownRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Execution(_) => RecordKind::Execution,
            Self::Run(_) => RecordKind::Run,
            Self::Case(_) => RecordKind::Case,
            Self::Session(_) => RecordKind::Session,
            Self::Issue(_) => RecordKind::Issue,
            Self::Milestone(_) => RecordKind::Milestone,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Execution(r) => &r.id,
            Self::Run(r) => &r.id,
            Self::Case(r) => &r.id,
            Self::Session(r) => &r.id,
            Self::Issue(r) => &r.id,
            Self::Milestone(r) => &r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Execution(r) => &r.name,
            Self::Run(r) => &r.name,
            Self::Case(r) => &r.name,
            Self::Session(r) => &r.name,
            Self::Issue(r) => &r.name,
            Self::Milestone(r) => &r.name,
        }
    }

    /// Parse a serialized record, picking the variant with [`RecordKind::detect`].
    pub fn from_value(value: Value) -> Option<Self> {
        let record = match RecordKind::detect(&value)? {
            RecordKind::Execution => Self::Execution(serde_json::from_value(value).ok()?),
            RecordKind::Run => Self::Run(serde_json::from_value(value).ok()?),
            RecordKind::Case => Self::Case(serde_json::from_value(value).ok()?),
            RecordKind::Session => Self::Session(serde_json::from_value(value).ok()?),
            RecordKind::Issue => Self::Issue(serde_json::from_value(value).ok()?),
            RecordKind::Milestone => Self::Milestone(serde_json::from_value(value).ok()?),
        };
        Some(record)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Execution(r) => r.timestamp(),
            Self::Run(r) => r.timestamp(),
            Self::Case(r) => r.timestamp(),
            Self::Session(r) => r.timestamp(),
            Self::Issue(r) => r.timestamp(),
            Self::Milestone(r) => r.timestamp(),
        }
    }
}

/// Summary over the whole drilled set of a rate metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownAggregates {
    pub status_counts: Vec<StatusCount>,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownResponse {
    pub data: Vec<DrillDownRecord>,
    pub total: usize,
    pub has_more: bool,
    pub context: DrillDownContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<DrillDownAggregates>,
}

#[derive(Debug, Clone)]
struct CellFilter {
    /// `None` selects the none bucket.
    equals: Vec<(Dimension, Option<String>)>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    grouping: DateGrouping,
}

impl CellFilter {
    fn matches<R: Dimensioned>(&self, record: &R) -> bool {
        let in_window = self.window.map_or(true, |(start, end)| {
            let at = record.timestamp();
            at >= start && at < end
        });
        in_window
            && self
                .equals
                .iter()
                .all(|(d, id)| {
                    record.dimension_key(*d, self.grouping).group_id() == id.as_deref()
                })
    }
}

fn bucket_start_of(value: &DimensionValue) -> Option<DateTime<Utc>> {
    value.executed_at.or_else(|| {
        NaiveDate::parse_from_str(&value.id, "%Y-%m-%d")
            .ok()
            .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::default())))
    })
}

fn build_filter(context: &DrillDownContext) -> Result<CellFilter, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let report_type = context.report_type;

    if !report_type.supports_metric(context.metric_id) {
        errors.push(
            "metricId",
            format!(
                "Metric '{}' is not available for the '{report_type}' report",
                context.metric_id
            ),
        );
    }
    if let (Some(start), Some(end)) = (context.start_date, context.end_date) {
        if end < start {
            errors.push("endDate", "End date must not be before the start date");
        }
    }

    let mut filter = CellFilter {
        equals: Vec::new(),
        window: None,
        grouping: context.date_grouping,
    };
    for (dimension, value) in &context.dimensions {
        if !report_type.supports_dimension(*dimension) {
            errors.push(
                "dimensions",
                format!("Dimension '{dimension}' is not available for the '{report_type}' report"),
            );
            continue;
        }
        if *dimension == Dimension::Date {
            match bucket_start_of(value) {
                Some(start) => {
                    filter.window = Some((start, bucket_end(context.date_grouping, start)));
                }
                None => errors.push(
                    "dimensions",
                    format!("Date value '{}' is not a bucket start", value.id),
                ),
            }
        } else {
            filter
                .equals
                .push((*dimension, value.group_id().map(str::to_owned)));
        }
    }

    errors.into_result().map(|()| filter)
}

fn narrow_executions(metric: Metric, records: &mut Vec<ExecutionRecord>) {
    match metric {
        Metric::PassCount => records.retain(|e| e.status.is_success),
        Metric::FailCount => records.retain(|e| e.status.is_failure && !e.status.is_success),
        _ => {}
    }
}

/// Resolves drill-down contexts into record pages.
#[derive(Debug, Clone, Default)]
pub struct DrillDownResolver {
    config: EngineConfig,
}

impl DrillDownResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn resolve(
        &self,
        context: &DrillDownContext,
        offset: usize,
        limit: Option<u32>,
        source: &dyn DataSource,
    ) -> ReportResult<DrillDownResponse> {
        let filter = build_filter(context).map_err(|errors| {
            warn!(report_type = %context.report_type, errors = %errors, "rejected drill-down");
            ReportError::from(errors)
        })?;

        if let Some(project_id) = context.scoped_project() {
            if !source.project_exists(project_id).await? {
                return Err(ReportError::not_found("project", project_id));
            }
        }
        let scope = RecordScope::new(
            context.scoped_project().map(str::to_owned),
            context.start_date,
            context.end_date,
        );

        let metric = context.metric_id;
        let family = context.report_type.family();
        let kind = RecordKind::for_metric(context.report_type, metric);
        debug!(?kind, constraints = filter.equals.len(), "drill-down filter");

        let mut aggregates = None;
        let mut records: Vec<DrillDownRecord> = match kind {
            RecordKind::Execution => {
                let mut executions: Vec<ExecutionRecord> = source
                    .executions(&scope)
                    .await?
                    .into_iter()
                    .filter(|e| match family {
                        ReportFamily::UserEngagement => filter.matches(&Activity::Executed(e)),
                        _ => filter.matches(e),
                    })
                    .collect();
                narrow_executions(metric, &mut executions);
                if metric.is_execution_rate() {
                    let outcomes: Vec<ExecutionOutcome> =
                        executions.iter().map(ExecutionRecord::outcome).collect();
                    aggregates = Some(DrillDownAggregates {
                        status_counts: metrics::status_counts(&executions),
                        pass_rate: metrics::pass_rate(&outcomes),
                    });
                }
                executions.into_iter().map(DrillDownRecord::Execution).collect()
            }
            RecordKind::Run => source
                .runs(&scope)
                .await?
                .into_iter()
                .filter(|r| filter.matches(r))
                .filter(|r| metric != Metric::CompletedRuns || r.is_completed)
                .map(DrillDownRecord::Run)
                .collect(),
            RecordKind::Case => source
                .cases(&scope)
                .await?
                .into_iter()
                .filter(|c| match family {
                    ReportFamily::UserEngagement => filter.matches(&Activity::CreatedCase(c)),
                    _ => filter.matches(c),
                })
                .filter(|c| metric != Metric::AutomatedCases || c.automated)
                .map(DrillDownRecord::Case)
                .collect(),
            RecordKind::Session => source
                .sessions(&scope)
                .await?
                .into_iter()
                .filter(|s| match family {
                    ReportFamily::UserEngagement => filter.matches(&Activity::CreatedSession(s)),
                    _ => filter.matches(s),
                })
                .filter(|s| metric != Metric::CompletedSessions || s.is_completed)
                .map(DrillDownRecord::Session)
                .collect(),
            RecordKind::Issue => source
                .issues(&scope)
                .await?
                .into_iter()
                .filter(|i| filter.matches(i))
                .filter(|i| match metric {
                    Metric::OpenIssues => !i.is_closed,
                    Metric::ClosedIssues => i.is_closed,
                    _ => true,
                })
                .map(DrillDownRecord::Issue)
                .collect(),
            RecordKind::Milestone => source
                .milestones(&scope)
                .await?
                .into_iter()
                .filter(|m| !m.is_deleted && filter.matches(m))
                .filter(|m| match metric {
                    Metric::ActiveMilestones => m.snapshot().is_active(),
                    _ => true,
                })
                .map(DrillDownRecord::Milestone)
                .collect(),
        };

        records.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });

        let total = records.len();
        let limit = self.config.drilldown_limit(limit) as usize;
        let data: Vec<DrillDownRecord> = records.into_iter().skip(offset).take(limit).collect();
        let has_more = offset.saturating_add(data.len()) < total;

        info!(
            report_type = %context.report_type,
            metric = %metric,
            total,
            returned = data.len(),
            "drill-down resolved"
        );
        Ok(DrillDownResponse {
            data,
            total,
            has_more,
            context: context.clone(),
            aggregates,
        })
    }
}
