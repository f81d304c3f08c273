//! End-to-end report generation against the in-memory fixture.

mod common;

use common::{at, source, source_with_user_named_none, FailingSource};
use testdeck_core::{
    AggregationEngine, DataSource, Dimension, EngineConfig, Metric, MetricValue, PageSize,
    ReportError, ReportPage, ReportRequest, ReportResult, ReportType, RequestValidator,
    SortDirection,
};

async fn generate(request: ReportRequest, source: &dyn DataSource) -> ReportResult<ReportPage> {
    generate_with(EngineConfig::default(), request, source).await
}

async fn generate_with(
    config: EngineConfig,
    request: ReportRequest,
    source: &dyn DataSource,
) -> ReportResult<ReportPage> {
    let validated = RequestValidator::new(&config).validate(request)?;
    AggregationEngine::new(config).run(&validated, source).await
}

fn labels(page: &ReportPage, dimension: Dimension) -> Vec<String> {
    page.results
        .iter()
        .map(|r| r.dimension(dimension).unwrap().label().to_owned())
        .collect()
}

fn counts(page: &ReportPage, metric: Metric) -> Vec<MetricValue> {
    page.results
        .iter()
        .map(|r| r.metric(metric).unwrap().clone())
        .collect()
}

fn by_user() -> ReportRequest {
    ReportRequest::new(ReportType::TestExecution)
        .with_project("p1")
        .with_dimensions([Dimension::User])
        .with_metrics([Metric::TestResults, Metric::PassRate])
}

#[tokio::test]
async fn executions_grouped_by_user() {
    let page = generate(by_user(), &source()).await.unwrap();

    assert_eq!(page.total_count, 3);
    assert_eq!(page.page_count, 1);
    assert_eq!(labels(&page, Dimension::User), vec!["Ada", "Grace", "None"]);
    assert_eq!(
        counts(&page, Metric::TestResults),
        vec![MetricValue::Count(2), MetricValue::Count(2), MetricValue::Count(1)]
    );
    assert_eq!(
        counts(&page, Metric::PassRate),
        vec![
            MetricValue::Number(50.0),
            MetricValue::Number(100.0),
            MetricValue::Number(0.0)
        ]
    );
}

#[tokio::test]
async fn user_with_reserved_id_keeps_its_own_row() {
    let page = generate(by_user(), &source_with_user_named_none()).await.unwrap();

    assert_eq!(
        labels(&page, Dimension::User),
        vec!["Ada", "Grace", "Nonie", "None"]
    );
    assert_eq!(
        counts(&page, Metric::TestResults),
        vec![
            MetricValue::Count(1),
            MetricValue::Count(2),
            MetricValue::Count(1),
            MetricValue::Count(1)
        ]
    );
    let nonie = page.results[2].dimension(Dimension::User).unwrap();
    assert!(!nonie.is_none_bucket());
    assert!(page.results[3].dimension(Dimension::User).unwrap().is_none_bucket());
}

#[tokio::test]
async fn rows_serialize_dimensions_and_labels() {
    let page = generate(by_user(), &source()).await.unwrap();
    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["totalCount"], 3);
    assert_eq!(json["pageSize"], 25);
    assert_eq!(json["results"][0]["user"]["id"], "u1");
    assert_eq!(json["results"][0]["Pass Rate (%)"], 50.0);
    assert_eq!(json["results"][2]["user"]["id"], "none");
    assert_eq!(json["results"][2]["user"]["unassigned"], true);
    assert!(json["results"][0]["user"].get("unassigned").is_none());
}

#[tokio::test]
async fn weekly_buckets_sort_chronologically() {
    let request = ReportRequest::new(ReportType::TestExecution)
        .with_project("p1")
        .with_dimensions([Dimension::Date])
        .with_metrics([Metric::TestResults]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(
        labels(&page, Dimension::Date),
        vec!["Week of 2024-03-04", "Week of 2024-03-11"]
    );
    assert_eq!(
        counts(&page, Metric::TestResults),
        vec![MetricValue::Count(3), MetricValue::Count(2)]
    );
    let first = page.results[0].dimension(Dimension::Date).unwrap();
    assert_eq!(first.executed_at, Some(at("2024-03-04T00:00:00Z")));
}

#[tokio::test]
async fn cross_project_reports_span_every_project() {
    let request = ReportRequest::new(ReportType::CrossProjectTestExecution)
        .with_project("ignored")
        .with_dimensions([Dimension::Project])
        .with_metrics([Metric::TestResults]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(labels(&page, Dimension::Project), vec!["Mobile", "Web"]);
    assert_eq!(
        counts(&page, Metric::TestResults),
        vec![MetricValue::Count(1), MetricValue::Count(5)]
    );
}

#[tokio::test]
async fn date_range_is_inclusive() {
    let request = ReportRequest::new(ReportType::TestExecution)
        .with_project("p1")
        .with_dimensions([Dimension::Status])
        .with_metrics([Metric::TestResults])
        .with_range(
            Some(at("2024-03-05T00:00:00Z")),
            Some(at("2024-03-05T10:00:00Z")),
        );
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(labels(&page, Dimension::Status), vec!["Failed", "Passed"]);
    assert_eq!(page.total_count, 2);
}

#[tokio::test]
async fn explicit_sort_and_pagination() {
    let request = by_user().with_sort("passRate", SortDirection::Desc);
    let page = generate(request, &source()).await.unwrap();
    assert_eq!(labels(&page, Dimension::User), vec!["Grace", "Ada", "None"]);

    let second = generate(by_user().with_page(2, PageSize::Count(2)), &source())
        .await
        .unwrap();
    assert_eq!(second.total_count, 3);
    assert_eq!(second.page_count, 2);
    assert_eq!(labels(&second, Dimension::User), vec!["None"]);

    let beyond = generate(by_user().with_page(5, PageSize::Count(2)), &source())
        .await
        .unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.total_count, 3);

    let all = generate(by_user().with_page(1, PageSize::All), &source())
        .await
        .unwrap();
    assert_eq!(all.results.len(), 3);
}

#[tokio::test]
async fn elapsed_metrics_ignore_unknown_durations() {
    let request = ReportRequest::new(ReportType::TestExecution)
        .with_project("p1")
        .with_dimensions([Dimension::User])
        .with_metrics([Metric::AvgElapsed, Metric::TotalElapsed]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(
        counts(&page, Metric::AvgElapsed),
        vec![
            MetricValue::Number(15.0),
            MetricValue::Number(5.0),
            MetricValue::Number(0.0)
        ]
    );
    assert_eq!(
        counts(&page, Metric::TotalElapsed),
        vec![
            MetricValue::Number(30.0),
            MetricValue::Number(5.0),
            MetricValue::Number(0.0)
        ]
    );
}

#[tokio::test]
async fn user_engagement_combines_activity_kinds() {
    let request = ReportRequest::new(ReportType::UserEngagement)
        .with_project("p1")
        .with_dimensions([Dimension::User])
        .with_metrics([
            Metric::ExecutionCount,
            Metric::TestsCreated,
            Metric::SessionsCreated,
        ]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(labels(&page, Dimension::User), vec!["Ada", "Grace", "None"]);
    assert_eq!(
        counts(&page, Metric::ExecutionCount),
        vec![MetricValue::Count(2), MetricValue::Count(2), MetricValue::Count(1)]
    );
    assert_eq!(
        counts(&page, Metric::TestsCreated),
        vec![MetricValue::Count(2), MetricValue::Count(1), MetricValue::Count(0)]
    );
    assert_eq!(
        counts(&page, Metric::SessionsCreated),
        vec![MetricValue::Count(1), MetricValue::Count(1), MetricValue::Count(0)]
    );
}

#[tokio::test]
async fn last_active_date_per_user() {
    let request = ReportRequest::new(ReportType::UserEngagement)
        .with_project("p1")
        .with_dimensions([Dimension::User])
        .with_metrics([Metric::LastActiveDate]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(
        counts(&page, Metric::LastActiveDate),
        vec![
            MetricValue::Date(Some(at("2024-03-06T12:00:00Z"))),
            MetricValue::Date(Some(at("2024-03-12T09:00:00Z"))),
            MetricValue::Date(Some(at("2024-03-12T10:00:00Z"))),
        ]
    );
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["results"][0]["Last Active Date"], "2024-03-06T12:00:00Z");
}

#[tokio::test]
async fn project_health_excludes_deleted_milestones() {
    let request = ReportRequest::new(ReportType::CrossProjectHealth)
        .with_dimensions([Dimension::Project])
        .with_metrics([
            Metric::MilestoneProgress,
            Metric::CompletionRate,
            Metric::TotalMilestones,
            Metric::ActiveMilestones,
        ]);
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(labels(&page, Dimension::Project), vec!["Mobile", "Web"]);
    let mobile = &page.results[0];
    assert_eq!(mobile.metric(Metric::MilestoneProgress), Some(&MetricValue::Number(100.0)));
    assert_eq!(mobile.metric(Metric::CompletionRate), Some(&MetricValue::Number(100.0)));

    let web = &page.results[1];
    assert_eq!(web.metric(Metric::MilestoneProgress), Some(&MetricValue::Number(66.67)));
    assert_eq!(web.metric(Metric::CompletionRate), Some(&MetricValue::Number(33.33)));
    assert_eq!(web.metric(Metric::TotalMilestones), Some(&MetricValue::Count(3)));
    assert_eq!(web.metric(Metric::ActiveMilestones), Some(&MetricValue::Count(1)));
}

#[tokio::test]
async fn run_repository_session_and_issue_reports() {
    let runs = generate(
        ReportRequest::new(ReportType::TestRunSummary)
            .with_project("p1")
            .with_dimensions([Dimension::Creator])
            .with_metrics([Metric::RunCount, Metric::CompletedRuns, Metric::RunCompletionRate]),
        &source(),
    )
    .await
    .unwrap();
    assert_eq!(labels(&runs, Dimension::Creator), vec!["Ada", "Grace"]);
    assert_eq!(
        counts(&runs, Metric::RunCompletionRate),
        vec![MetricValue::Number(100.0), MetricValue::Number(0.0)]
    );

    let cases = generate(
        ReportRequest::new(ReportType::RepositoryStats)
            .with_project("p1")
            .with_dimensions([Dimension::Creator])
            .with_metrics([Metric::CaseCount, Metric::AutomatedCases, Metric::AutomationRate]),
        &source(),
    )
    .await
    .unwrap();
    assert_eq!(
        counts(&cases, Metric::CaseCount),
        vec![MetricValue::Count(2), MetricValue::Count(1)]
    );
    assert_eq!(
        counts(&cases, Metric::AutomationRate),
        vec![MetricValue::Number(100.0), MetricValue::Number(0.0)]
    );

    let sessions = generate(
        ReportRequest::new(ReportType::SessionAnalysis)
            .with_project("p1")
            .with_dimensions([Dimension::User])
            .with_metrics([
                Metric::SessionCount,
                Metric::CompletedSessions,
                Metric::AvgSessionDuration,
            ]),
        &source(),
    )
    .await
    .unwrap();
    assert_eq!(labels(&sessions, Dimension::User), vec!["Grace"]);
    assert_eq!(
        sessions.results[0].metric(Metric::AvgSessionDuration),
        Some(&MetricValue::Number(600.0))
    );

    let issues = generate(
        ReportRequest::new(ReportType::IssueTracking)
            .with_project("p1")
            .with_dimensions([Dimension::Status])
            .with_metrics([Metric::IssueCount, Metric::OpenIssues, Metric::ClosedIssues]),
        &source(),
    )
    .await
    .unwrap();
    assert_eq!(labels(&issues, Dimension::Status), vec!["Closed", "Open"]);
    assert_eq!(
        counts(&issues, Metric::OpenIssues),
        vec![MetricValue::Count(0), MetricValue::Count(1)]
    );
}

#[tokio::test]
async fn flaky_tests_report_only_flipping_cases() {
    let request = ReportRequest::new(ReportType::FlakyTests).with_project("p1");
    let page = generate(request, &source()).await.unwrap();

    assert_eq!(labels(&page, Dimension::TestCase), vec!["Login"]);
    let row = &page.results[0];
    assert_eq!(row.metric(Metric::StatusFlips), Some(&MetricValue::Count(2)));
    assert_eq!(row.metric(Metric::DefinitiveExecutions), Some(&MetricValue::Count(3)));
    assert_eq!(row.metric(Metric::FlipRate), Some(&MetricValue::Number(100.0)));
    assert_eq!(
        row.metric(Metric::LastExecuted),
        Some(&MetricValue::Date(Some(at("2024-03-12T09:00:00Z"))))
    );

    let strict = EngineConfig::default().with_flaky_min_flips(3);
    let none = generate_with(
        strict,
        ReportRequest::new(ReportType::CrossProjectFlakyTests),
        &source(),
    )
    .await
    .unwrap();
    assert_eq!(none.total_count, 0);
}

#[tokio::test]
async fn no_matching_records_is_an_empty_page() {
    let request = by_user().with_range(Some(at("2030-01-01T00:00:00Z")), None);
    let page = generate(request, &source()).await.unwrap();
    assert!(page.results.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.page_count, 0);
}

#[tokio::test]
async fn invalid_requests_never_reach_the_source() {
    let request = ReportRequest::new(ReportType::TestExecution)
        .with_project("p1")
        .with_dimensions([Dimension::Status, Dimension::TestCase])
        .with_metrics([Metric::TestResults]);
    let err = generate(request, &FailingSource).await.unwrap_err();

    let errors = err.validation_errors().expect("validation error");
    assert!(errors
        .for_field("dimensions")
        .any(|m| m == "The 'status' and 'testCase' dimensions cannot be used together"));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let err = generate(
        ReportRequest::new(ReportType::TestExecution)
            .with_project("p404")
            .with_metrics([Metric::TestResults]),
        &source(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ReportError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn upstream_failures_propagate_without_details() {
    let err = generate(by_user(), &FailingSource).await.unwrap_err();
    assert!(matches!(err, ReportError::Upstream { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(!err.public_message().contains("db-primary"));
}
