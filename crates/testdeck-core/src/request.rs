//! Report request vocabulary: report types, dimensions, metrics, paging.
//!
//! Wire names are load-bearing; they are what the web client sends.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ReportError, ReportResult, ValidationErrors};

/// Which entity family a report reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFamily {
    Execution,
    UserEngagement,
    ProjectHealth,
    RunSummary,
    Repository,
    Sessions,
    Issues,
    Flaky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    TestExecution,
    CrossProjectTestExecution,
    UserEngagement,
    CrossProjectUserEngagement,
    ProjectHealth,
    CrossProjectHealth,
    TestRunSummary,
    RepositoryStats,
    SessionAnalysis,
    IssueTracking,
    FlakyTests,
    CrossProjectFlakyTests,
}

impl ReportType {
    pub const ALL: [ReportType; 12] = [
        Self::TestExecution,
        Self::CrossProjectTestExecution,
        Self::UserEngagement,
        Self::CrossProjectUserEngagement,
        Self::ProjectHealth,
        Self::CrossProjectHealth,
        Self::TestRunSummary,
        Self::RepositoryStats,
        Self::SessionAnalysis,
        Self::IssueTracking,
        Self::FlakyTests,
        Self::CrossProjectFlakyTests,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestExecution => "test-execution",
            Self::CrossProjectTestExecution => "cross-project-test-execution",
            Self::UserEngagement => "user-engagement",
            Self::CrossProjectUserEngagement => "cross-project-user-engagement",
            Self::ProjectHealth => "project-health",
            Self::CrossProjectHealth => "cross-project-health",
            Self::TestRunSummary => "test-run-summary",
            Self::RepositoryStats => "repository-stats",
            Self::SessionAnalysis => "session-analysis",
            Self::IssueTracking => "issue-tracking",
            Self::FlakyTests => "flaky-tests",
            Self::CrossProjectFlakyTests => "cross-project-flaky-tests",
        }
    }

    pub fn family(self) -> ReportFamily {
        match self {
            Self::TestExecution | Self::CrossProjectTestExecution => ReportFamily::Execution,
            Self::UserEngagement | Self::CrossProjectUserEngagement => {
                ReportFamily::UserEngagement
            }
            Self::ProjectHealth | Self::CrossProjectHealth => ReportFamily::ProjectHealth,
            Self::TestRunSummary => ReportFamily::RunSummary,
            Self::RepositoryStats => ReportFamily::Repository,
            Self::SessionAnalysis => ReportFamily::Sessions,
            Self::IssueTracking => ReportFamily::Issues,
            Self::FlakyTests | Self::CrossProjectFlakyTests => ReportFamily::Flaky,
        }
    }

    pub fn is_cross_project(self) -> bool {
        matches!(
            self,
            Self::CrossProjectTestExecution
                | Self::CrossProjectUserEngagement
                | Self::CrossProjectHealth
                | Self::CrossProjectFlakyTests
        )
    }

    /// Pre-aggregated kinds compute a fixed metric set and skip the
    /// metric/dimension count rules.
    pub fn is_pre_aggregated(self) -> bool {
        self.family() == ReportFamily::Flaky
    }

    pub fn is_execution(self) -> bool {
        self.family() == ReportFamily::Execution
    }

    pub fn is_user_engagement(self) -> bool {
        self.family() == ReportFamily::UserEngagement
    }

    pub fn supported_dimensions(self) -> &'static [Dimension] {
        use Dimension::*;
        match self.family() {
            ReportFamily::Execution => &[
                User,
                Status,
                TestRun,
                TestCase,
                Milestone,
                Configuration,
                Project,
                Date,
            ],
            ReportFamily::UserEngagement => &[User, Project, Date],
            ReportFamily::ProjectHealth => &[Milestone, Project, Creator, Date],
            ReportFamily::RunSummary => &[TestRun, Milestone, Configuration, Creator, Project, Date],
            ReportFamily::Repository => &[Creator, Project, Date],
            ReportFamily::Sessions => &[User, Status, Milestone, Creator, Project, Date],
            ReportFamily::Issues => &[Status, Creator, Project, Date],
            ReportFamily::Flaky => &[TestCase, Project],
        }
    }

    pub fn supported_metrics(self) -> &'static [Metric] {
        use Metric::*;
        match self.family() {
            ReportFamily::Execution => &[
                TestResults,
                PassRate,
                PassCount,
                FailCount,
                AvgElapsed,
                TotalElapsed,
            ],
            ReportFamily::UserEngagement => {
                &[ExecutionCount, TestsCreated, SessionsCreated, LastActiveDate]
            }
            ReportFamily::ProjectHealth => &[
                MilestoneProgress,
                CompletionRate,
                TotalMilestones,
                ActiveMilestones,
            ],
            ReportFamily::RunSummary => &[RunCount, CompletedRuns, RunCompletionRate],
            ReportFamily::Repository => &[CaseCount, AutomatedCases, AutomationRate],
            ReportFamily::Sessions => &[SessionCount, CompletedSessions, AvgSessionDuration],
            ReportFamily::Issues => &[IssueCount, OpenIssues, ClosedIssues],
            ReportFamily::Flaky => &[StatusFlips, FlipRate, DefinitiveExecutions, LastExecuted],
        }
    }

    pub fn supports_dimension(self, dimension: Dimension) -> bool {
        self.supported_dimensions().contains(&dimension)
    }

    pub fn supports_metric(self, metric: Metric) -> bool {
        self.supported_metrics().contains(&metric)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    User,
    Status,
    TestRun,
    TestCase,
    Milestone,
    Configuration,
    Project,
    Date,
    Creator,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Status => "status",
            Self::TestRun => "testRun",
            Self::TestCase => "testCase",
            Self::Milestone => "milestone",
            Self::Configuration => "configuration",
            Self::Project => "project",
            Self::Date => "date",
            Self::Creator => "creator",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TestResults,
    PassRate,
    PassCount,
    FailCount,
    AvgElapsed,
    TotalElapsed,
    ExecutionCount,
    TestsCreated,
    SessionsCreated,
    LastActiveDate,
    MilestoneProgress,
    CompletionRate,
    TotalMilestones,
    ActiveMilestones,
    RunCount,
    CompletedRuns,
    RunCompletionRate,
    CaseCount,
    AutomatedCases,
    AutomationRate,
    SessionCount,
    CompletedSessions,
    AvgSessionDuration,
    IssueCount,
    OpenIssues,
    ClosedIssues,
    StatusFlips,
    FlipRate,
    DefinitiveExecutions,
    LastExecuted,
}

impl Metric {
    pub fn id(self) -> &'static str {
        match self {
            Self::TestResults => "testResults",
            Self::PassRate => "passRate",
            Self::PassCount => "passCount",
            Self::FailCount => "failCount",
            Self::AvgElapsed => "avgElapsed",
            Self::TotalElapsed => "totalElapsed",
            Self::ExecutionCount => "executionCount",
            Self::TestsCreated => "testsCreated",
            Self::SessionsCreated => "sessionsCreated",
            Self::LastActiveDate => "lastActiveDate",
            Self::MilestoneProgress => "milestoneProgress",
            Self::CompletionRate => "completionRate",
            Self::TotalMilestones => "totalMilestones",
            Self::ActiveMilestones => "activeMilestones",
            Self::RunCount => "runCount",
            Self::CompletedRuns => "completedRuns",
            Self::RunCompletionRate => "runCompletionRate",
            Self::CaseCount => "caseCount",
            Self::AutomatedCases => "automatedCases",
            Self::AutomationRate => "automationRate",
            Self::SessionCount => "sessionCount",
            Self::CompletedSessions => "completedSessions",
            Self::AvgSessionDuration => "avgSessionDuration",
            Self::IssueCount => "issueCount",
            Self::OpenIssues => "openIssues",
            Self::ClosedIssues => "closedIssues",
            Self::StatusFlips => "statusFlips",
            Self::FlipRate => "flipRate",
            Self::DefinitiveExecutions => "definitiveExecutions",
            Self::LastExecuted => "lastExecuted",
        }
    }

    /// Column key in report rows. Stable, human-facing.
    pub fn label(self) -> &'static str {
        match self {
            Self::TestResults => "Test Results",
            Self::PassRate => "Pass Rate (%)",
            Self::PassCount => "Passed Tests",
            Self::FailCount => "Failed Tests",
            Self::AvgElapsed => "Avg. Elapsed (s)",
            Self::TotalElapsed => "Total Elapsed (s)",
            Self::ExecutionCount => "Executions",
            Self::TestsCreated => "Test Cases Created",
            Self::SessionsCreated => "Sessions Created",
            Self::LastActiveDate => "Last Active Date",
            Self::MilestoneProgress => "Milestone Progress (%)",
            Self::CompletionRate => "Completion Rate (%)",
            Self::TotalMilestones => "Total Milestones",
            Self::ActiveMilestones => "Active Milestones",
            Self::RunCount => "Total Runs",
            Self::CompletedRuns => "Completed Runs",
            Self::RunCompletionRate => "Run Completion Rate (%)",
            Self::CaseCount => "Total Test Cases",
            Self::AutomatedCases => "Automated Test Cases",
            Self::AutomationRate => "Automation Rate (%)",
            Self::SessionCount => "Total Sessions",
            Self::CompletedSessions => "Completed Sessions",
            Self::AvgSessionDuration => "Avg. Session Duration (s)",
            Self::IssueCount => "Total Issues",
            Self::OpenIssues => "Open Issues",
            Self::ClosedIssues => "Closed Issues",
            Self::StatusFlips => "Status Flips",
            Self::FlipRate => "Flip Rate (%)",
            Self::DefinitiveExecutions => "Definitive Executions",
            Self::LastExecuted => "Last Executed",
        }
    }

    /// Percentage metrics over executions; drill-downs on these carry a status breakdown.
    pub fn is_execution_rate(self) -> bool {
        matches!(self, Self::PassRate | Self::FlipRate)
    }

    /// Resolve a sort column given as metric id or label.
    pub fn matches_column(self, column: &str) -> bool {
        self.id() == column || self.label() == column
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGrouping {
    Daily,
    #[default]
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

/// Numeric page size or the literal `"All"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Count(u32),
    All,
}

impl Serialize for PageSize {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => s.serialize_u32(*n),
            Self::All => s.serialize_str("All"),
        }
    }
}

impl<'de> Deserialize<'de> for PageSize {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Count(n) => u32::try_from(n)
                .map(Self::Count)
                .map_err(|_| serde::de::Error::custom(format!("page size {n} is too large"))),
            Raw::Text(s) if s.eq_ignore_ascii_case("all") => Ok(Self::All),
            Raw::Text(s) => s.trim().parse::<u32>().map(Self::Count).map_err(|_| {
                serde::de::Error::custom(format!(
                    "page size must be a number or \"All\", got \"{s}\""
                ))
            }),
        }
    }
}

fn default_page() -> u32 {
    1
}

/// Raw report request as received from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_type: ReportType,

    /// Ordered; order defines row nesting.
    #[serde(default)]
    pub dimensions: Vec<Dimension>,

    #[serde(default)]
    pub metrics: Vec<Metric>,

    /// Absent means cross-project.
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default)]
    pub page_size: Option<PageSize>,

    #[serde(default)]
    pub sort_column: Option<String>,

    #[serde(default)]
    pub sort_direction: Option<SortDirection>,

    #[serde(default)]
    pub date_grouping: DateGrouping,
}

impl ReportRequest {
    pub fn new(report_type: ReportType) -> Self {
        Self {
            report_type,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            project_id: None,
            start_date: None,
            end_date: None,
            page: default_page(),
            page_size: None,
            sort_column: None,
            sort_direction: None,
            date_grouping: DateGrouping::default(),
        }
    }

    /// Parse a JSON body. Shape errors surface as a validation failure on `request`.
    pub fn from_json(raw: &str) -> ReportResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ReportError::from(ValidationErrors::single(
                "request",
                format!("Malformed request: {e}"),
            ))
        })
    }

    pub fn with_dimensions(mut self, dimensions: impl IntoIterator<Item = Dimension>) -> Self {
        self.dimensions = dimensions.into_iter().collect();
        self
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.metrics = metrics.into_iter().collect();
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_page(mut self, page: u32, page_size: PageSize) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = Some(direction);
        self
    }

    pub fn with_date_grouping(mut self, grouping: DateGrouping) -> Self {
        self.date_grouping = grouping;
        self
    }

    /// Project filter actually applied; cross-project kinds ignore `projectId`.
    pub fn scoped_project(&self) -> Option<&str> {
        if self.report_type.is_cross_project() {
            None
        } else {
            self.project_id.as_deref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        let req = ReportRequest::from_json(
            r#"{
                "reportType": "cross-project-test-execution",
                "dimensions": ["user", "testRun", "date"],
                "metrics": ["testResults", "passRate"],
                "startDate": "2024-01-01T00:00:00Z",
                "pageSize": "All",
                "sortDirection": "DESC",
                "dateGrouping": "monthly"
            }"#,
        )
        .unwrap();

        assert_eq!(req.report_type, ReportType::CrossProjectTestExecution);
        assert_eq!(
            req.dimensions,
            vec![Dimension::User, Dimension::TestRun, Dimension::Date]
        );
        assert_eq!(req.metrics, vec![Metric::TestResults, Metric::PassRate]);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, Some(PageSize::All));
        assert_eq!(req.sort_direction, Some(SortDirection::Desc));
        assert_eq!(req.date_grouping, DateGrouping::Monthly);
        assert!(req.end_date.is_none());
    }

    #[test]
    fn page_size_accepts_numbers_and_numeric_strings() {
        let n: PageSize = serde_json::from_str("50").unwrap();
        assert_eq!(n, PageSize::Count(50));
        let s: PageSize = serde_json::from_str("\"10\"").unwrap();
        assert_eq!(s, PageSize::Count(10));
        assert!(serde_json::from_str::<PageSize>("\"lots\"").is_err());
        assert_eq!(serde_json::to_string(&PageSize::All).unwrap(), "\"All\"");
    }

    #[test]
    fn malformed_request_is_a_validation_error() {
        let err = ReportRequest::from_json(r#"{"reportType": "nope"}"#).unwrap_err();
        let errors = err.validation_errors().expect("validation error");
        assert_eq!(errors.errors()[0].field, "request");
    }

    #[test]
    fn every_report_type_offers_metrics_and_round_trips_its_name() {
        for rt in ReportType::ALL {
            assert!(!rt.supported_metrics().is_empty(), "{rt}");
            let json = serde_json::to_string(&rt).unwrap();
            assert_eq!(json, format!("\"{}\"", rt.as_str()));
        }
    }

    #[test]
    fn metric_columns_match_id_or_label() {
        assert!(Metric::PassRate.matches_column("passRate"));
        assert!(Metric::PassRate.matches_column("Pass Rate (%)"));
        assert!(!Metric::PassRate.matches_column("Pass Rate"));
    }

    #[test]
    fn cross_project_kinds_ignore_project_id() {
        let req = ReportRequest::new(ReportType::CrossProjectHealth).with_project("p1");
        assert_eq!(req.scoped_project(), None);
        let req = ReportRequest::new(ReportType::ProjectHealth).with_project("p1");
        assert_eq!(req.scoped_project(), Some("p1"));
    }
}
