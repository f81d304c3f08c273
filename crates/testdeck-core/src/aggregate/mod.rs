//! Aggregation engine.
//!
//! Fetches the records a report reads, groups them by the ordered dimension
//! values, evaluates the requested metrics per group and returns one sorted
//! page of rows.

mod order;
mod row;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dimension::{DimensionValue, Dimensioned};
use crate::error::{ReportError, ReportResult};
use crate::flaky::{self, FlakinessSummary};
use crate::metrics::{self, MilestoneSummary};
use crate::model::{
    CaseRecord, EntityRef, ExecutionOutcome, ExecutionRecord, IssueRecord, MilestoneRecord,
    RunRecord, SessionRecord, UserRef,
};
use crate::request::{DateGrouping, Dimension, Metric, ReportFamily};
use crate::source::{DataSource, RecordScope};
use crate::validate::ValidatedRequest;

pub use row::{MetricValue, ReportPage, ReportRow};

/// One unit of user activity: an execution, a created case or a created session.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Activity<'a> {
    Executed(&'a ExecutionRecord),
    CreatedCase(&'a CaseRecord),
    CreatedSession(&'a SessionRecord),
}

impl<'a> Activity<'a> {
    pub(crate) fn collect(
        executions: &'a [ExecutionRecord],
        cases: &'a [CaseRecord],
        sessions: &'a [SessionRecord],
    ) -> Vec<Activity<'a>> {
        executions
            .iter()
            .map(Activity::Executed)
            .chain(cases.iter().map(Activity::CreatedCase))
            .chain(sessions.iter().map(Activity::CreatedSession))
            .collect()
    }

    fn actor(&self) -> Option<&UserRef> {
        match self {
            Self::Executed(e) => e.executed_by.as_ref(),
            Self::CreatedCase(c) => c.creator.as_ref(),
            Self::CreatedSession(s) => s.creator.as_ref(),
        }
    }
}

impl Dimensioned for Activity<'_> {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Executed(e) => e.executed_at,
            Self::CreatedCase(c) => c.created_at,
            Self::CreatedSession(s) => s.created_at,
        }
    }

    fn project(&self) -> &EntityRef {
        match self {
            Self::Executed(e) => &e.project,
            Self::CreatedCase(c) => &c.project,
            Self::CreatedSession(s) => &s.project,
        }
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::User => self.actor().map(DimensionValue::user),
            Dimension::Project => Some(DimensionValue::new(
                self.project().id.clone(),
                self.project().name.clone(),
            )),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.timestamp())),
            _ => None,
        }
    }
}

struct Group<'a, R> {
    key: Vec<(Dimension, DimensionValue)>,
    members: Vec<&'a R>,
}

/// Group by the ordered dimension key, keeping first-seen order.
fn group_records<'a, R: Dimensioned>(
    records: &'a [R],
    dimensions: &[Dimension],
    grouping: DateGrouping,
) -> Vec<Group<'a, R>> {
    let mut index: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    let mut groups: Vec<Group<'a, R>> = Vec::new();
    for record in records {
        let key: Vec<(Dimension, DimensionValue)> = dimensions
            .iter()
            .map(|d| (*d, record.dimension_key(*d, grouping)))
            .collect();
        let ids: Vec<Option<String>> = key
            .iter()
            .map(|(_, v)| v.group_id().map(str::to_owned))
            .collect();
        match index.get(&ids) {
            Some(&i) => groups[i].members.push(record),
            None => {
                index.insert(ids, groups.len());
                groups.push(Group {
                    key,
                    members: vec![record],
                });
            }
        }
    }
    groups
}

fn build_rows<'a, R, F>(
    records: &'a [R],
    dimensions: &[Dimension],
    grouping: DateGrouping,
    evaluate: F,
) -> Vec<ReportRow>
where
    R: Dimensioned,
    F: Fn(&[&'a R]) -> Vec<(Metric, MetricValue)>,
{
    let groups = group_records(records, dimensions, grouping);
    debug!(records = records.len(), groups = groups.len(), "grouped records");
    groups
        .into_iter()
        .map(|g| ReportRow {
            metrics: evaluate(&g.members),
            dimensions: g.key,
        })
        .collect()
}

fn execution_metrics(metrics: &[Metric], group: &[&ExecutionRecord]) -> Vec<(Metric, MetricValue)> {
    let outcomes: Vec<ExecutionOutcome> = group.iter().map(|e| e.outcome()).collect();
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::TestResults => MetricValue::count(group.len()),
                Metric::PassRate => MetricValue::Number(metrics::pass_rate(&outcomes)),
                Metric::PassCount => MetricValue::count(metrics::passed_count(&outcomes)),
                Metric::FailCount => MetricValue::count(metrics::failed_count(&outcomes)),
                Metric::AvgElapsed => MetricValue::Number(metrics::elapsed_average(
                    group.iter().map(|e| e.elapsed_secs),
                )),
                Metric::TotalElapsed => MetricValue::Number(metrics::elapsed_total(
                    group.iter().map(|e| e.elapsed_secs),
                )),
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn engagement_metrics(metrics: &[Metric], group: &[&Activity<'_>]) -> Vec<(Metric, MetricValue)> {
    let (mut executed, mut cases, mut sessions) = (0, 0, 0);
    for activity in group {
        match activity {
            Activity::Executed(_) => executed += 1,
            Activity::CreatedCase(_) => cases += 1,
            Activity::CreatedSession(_) => sessions += 1,
        }
    }
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::ExecutionCount => MetricValue::count(executed),
                Metric::TestsCreated => MetricValue::count(cases),
                Metric::SessionsCreated => MetricValue::count(sessions),
                Metric::LastActiveDate => {
                    MetricValue::Date(metrics::last_active(group.iter().map(|a| a.timestamp())))
                }
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn health_metrics(metrics: &[Metric], group: &[&MilestoneRecord]) -> Vec<(Metric, MetricValue)> {
    let snapshots: Vec<_> = group.iter().map(|m| m.snapshot()).collect();
    let summary = MilestoneSummary::from_snapshots(&snapshots);
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::MilestoneProgress => MetricValue::Number(summary.progress),
                Metric::CompletionRate => MetricValue::Number(summary.completion),
                Metric::TotalMilestones => MetricValue::count(summary.total),
                Metric::ActiveMilestones => MetricValue::count(summary.active),
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn run_metrics(metrics: &[Metric], group: &[&RunRecord]) -> Vec<(Metric, MetricValue)> {
    let completed = group.iter().filter(|r| r.is_completed).count();
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::RunCount => MetricValue::count(group.len()),
                Metric::CompletedRuns => MetricValue::count(completed),
                Metric::RunCompletionRate => {
                    MetricValue::Number(metrics::percentage(completed, group.len()))
                }
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn repository_metrics(metrics: &[Metric], group: &[&CaseRecord]) -> Vec<(Metric, MetricValue)> {
    let automated = group.iter().filter(|c| c.automated).count();
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::CaseCount => MetricValue::count(group.len()),
                Metric::AutomatedCases => MetricValue::count(automated),
                Metric::AutomationRate => {
                    MetricValue::Number(metrics::percentage(automated, group.len()))
                }
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn session_metrics(metrics: &[Metric], group: &[&SessionRecord]) -> Vec<(Metric, MetricValue)> {
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::SessionCount => MetricValue::count(group.len()),
                Metric::CompletedSessions => {
                    MetricValue::count(group.iter().filter(|s| s.is_completed).count())
                }
                Metric::AvgSessionDuration => MetricValue::Number(metrics::elapsed_average(
                    group.iter().map(|s| s.elapsed_secs),
                )),
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn issue_metrics(metrics: &[Metric], group: &[&IssueRecord]) -> Vec<(Metric, MetricValue)> {
    let closed = group.iter().filter(|i| i.is_closed).count();
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::IssueCount => MetricValue::count(group.len()),
                Metric::OpenIssues => MetricValue::count(group.len() - closed),
                Metric::ClosedIssues => MetricValue::count(closed),
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

fn flaky_metrics(metrics: &[Metric], summary: &FlakinessSummary) -> Vec<(Metric, MetricValue)> {
    metrics
        .iter()
        .filter_map(|m| {
            let value = match m {
                Metric::StatusFlips => MetricValue::Count(u64::from(summary.status_flips)),
                Metric::FlipRate => MetricValue::Number(summary.flip_rate),
                Metric::DefinitiveExecutions => MetricValue::count(summary.definitive_executions),
                Metric::LastExecuted => MetricValue::Date(summary.last_executed),
                _ => return None,
            };
            Some((*m, value))
        })
        .collect()
}

/// Flaky rows are always per test case; requested dimensions come after it.
pub(crate) fn flaky_dimensions(requested: &[Dimension]) -> Vec<Dimension> {
    let mut dimensions = vec![Dimension::TestCase];
    dimensions.extend(requested.iter().copied().filter(|d| *d != Dimension::TestCase));
    dimensions
}

/// Computes report pages from validated requests.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: EngineConfig,
}

impl AggregationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        validated: &ValidatedRequest,
        source: &dyn DataSource,
    ) -> ReportResult<ReportPage> {
        let request = validated.request();
        let report_type = request.report_type;

        if let Some(project_id) = request.scoped_project() {
            if !source.project_exists(project_id).await? {
                warn!(%report_type, project_id, "report for unknown project");
                return Err(ReportError::not_found("project", project_id));
            }
        }

        let scope = RecordScope::new(
            request.scoped_project().map(str::to_owned),
            request.start_date,
            request.end_date,
        );
        let grouping = request.date_grouping;
        let requested = validated.metrics();
        let mut dimensions = validated.dimensions().to_vec();

        let mut rows = match report_type.family() {
            ReportFamily::Execution => {
                let executions = source.executions(&scope).await?;
                build_rows(&executions, &dimensions, grouping, |g| {
                    execution_metrics(requested, g)
                })
            }
            ReportFamily::UserEngagement => {
                let executions = source.executions(&scope).await?;
                let cases = source.cases(&scope).await?;
                let sessions = source.sessions(&scope).await?;
                let activities = Activity::collect(&executions, &cases, &sessions);
                build_rows(&activities, &dimensions, grouping, |g| {
                    engagement_metrics(requested, g)
                })
            }
            ReportFamily::ProjectHealth => {
                let milestones: Vec<MilestoneRecord> = source
                    .milestones(&scope)
                    .await?
                    .into_iter()
                    .filter(|m| !m.is_deleted)
                    .collect();
                build_rows(&milestones, &dimensions, grouping, |g| {
                    health_metrics(requested, g)
                })
            }
            ReportFamily::RunSummary => {
                let runs = source.runs(&scope).await?;
                build_rows(&runs, &dimensions, grouping, |g| run_metrics(requested, g))
            }
            ReportFamily::Repository => {
                let cases = source.cases(&scope).await?;
                build_rows(&cases, &dimensions, grouping, |g| {
                    repository_metrics(requested, g)
                })
            }
            ReportFamily::Sessions => {
                let sessions = source.sessions(&scope).await?;
                build_rows(&sessions, &dimensions, grouping, |g| {
                    session_metrics(requested, g)
                })
            }
            ReportFamily::Issues => {
                let issues = source.issues(&scope).await?;
                build_rows(&issues, &dimensions, grouping, |g| issue_metrics(requested, g))
            }
            ReportFamily::Flaky => {
                dimensions = flaky_dimensions(&dimensions);
                let executions = source.executions(&scope).await?;
                let min_flips = self.config.flaky_min_flips;
                group_records(&executions, &dimensions, grouping)
                    .into_iter()
                    .filter_map(|g| {
                        let outcomes: Vec<ExecutionOutcome> =
                            g.members.iter().map(|e| e.outcome()).collect();
                        let summary = flaky::summarize(&outcomes);
                        (summary.status_flips >= min_flips).then(|| ReportRow {
                            dimensions: g.key,
                            metrics: flaky_metrics(requested, &summary),
                        })
                    })
                    .collect()
            }
        };

        order::sort_rows(&mut rows, order::SortSpec::for_request(validated, &dimensions));
        let page = order::paginate(rows, request.page, validated.page_size());
        info!(
            %report_type,
            total = page.total_count,
            rows = page.results.len(),
            page = page.page,
            "report generated"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusRef;
    use crate::request::{PageSize, ReportRequest, ReportType};
    use crate::source::{Dataset, MemorySource};
    use crate::validate::RequestValidator;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn execution(id: &str, case: &str, status: StatusRef, when: &str) -> ExecutionRecord {
        ExecutionRecord {
            id: id.into(),
            name: format!("Execution {id}"),
            project: EntityRef::new("p1", "Web"),
            test_run: EntityRef::new("r1", "Nightly"),
            test_case: EntityRef::new(case, case.to_uppercase()),
            milestone: None,
            configuration: None,
            status,
            executed_by: Some(UserRef::new("u1", "Ada")),
            executed_at: at(when),
            elapsed_secs: Some(2.0),
        }
    }

    fn source(executions: Vec<ExecutionRecord>) -> MemorySource {
        MemorySource::new(Dataset {
            projects: vec![EntityRef::new("p1", "Web")],
            executions,
            ..Dataset::default()
        })
    }

    async fn run(request: ReportRequest, source: &MemorySource) -> ReportResult<ReportPage> {
        let validated = RequestValidator::default().validate(request)?;
        AggregationEngine::default().run(&validated, source).await
    }

    #[tokio::test]
    async fn single_metric_without_dimensions_is_one_total_row() {
        let src = source(vec![
            execution("e1", "c1", StatusRef::passed(), "2024-03-01T10:00:00Z"),
            execution("e2", "c1", StatusRef::failed(), "2024-03-02T10:00:00Z"),
        ]);
        let page = run(
            ReportRequest::new(ReportType::TestExecution)
                .with_project("p1")
                .with_metrics([Metric::TestResults]),
            &src,
        )
        .await
        .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.results[0].metric(Metric::TestResults), Some(&MetricValue::Count(2)));
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let err = run(
            ReportRequest::new(ReportType::TestExecution)
                .with_project("missing")
                .with_metrics([Metric::TestResults]),
            &source(Vec::new()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReportError::NotFound { .. }));
    }

    #[tokio::test]
    async fn flaky_rows_keep_only_flipping_cases() {
        let src = source(vec![
            execution("e1", "c1", StatusRef::passed(), "2024-03-01T10:00:00Z"),
            execution("e2", "c1", StatusRef::failed(), "2024-03-02T10:00:00Z"),
            execution("e3", "c1", StatusRef::passed(), "2024-03-03T10:00:00Z"),
            execution("e4", "c2", StatusRef::passed(), "2024-03-01T10:00:00Z"),
            execution("e5", "c2", StatusRef::passed(), "2024-03-02T10:00:00Z"),
        ]);
        let page = run(
            ReportRequest::new(ReportType::CrossProjectFlakyTests).with_page(1, PageSize::All),
            &src,
        )
        .await
        .unwrap();
        assert_eq!(page.total_count, 1);
        let row = &page.results[0];
        assert_eq!(row.dimension(Dimension::TestCase).unwrap().id, "c1");
        assert_eq!(row.metric(Metric::StatusFlips), Some(&MetricValue::Count(2)));
        assert_eq!(row.metric(Metric::FlipRate), Some(&MetricValue::Number(100.0)));
    }

    #[test]
    fn flaky_dimensions_lead_with_test_case() {
        assert_eq!(flaky_dimensions(&[]), vec![Dimension::TestCase]);
        assert_eq!(
            flaky_dimensions(&[Dimension::Project, Dimension::TestCase]),
            vec![Dimension::TestCase, Dimension::Project]
        );
    }
}
