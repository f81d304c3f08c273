//! Shared fixture: two projects with a small, fully known history.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use testdeck_core::{
    CaseRecord, DataSource, Dataset, EntityRef, ExecutionRecord, IssueRecord, MemorySource,
    MilestoneRecord, RecordScope, ReportError, ReportResult, RunRecord, SessionRecord, StatusRef,
    UserRef,
};

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn web() -> EntityRef {
    EntityRef::new("p1", "Web")
}

pub fn mobile() -> EntityRef {
    EntityRef::new("p2", "Mobile")
}

pub fn ada() -> UserRef {
    UserRef::new("u1", "Ada").with_email("ada@example.com")
}

pub fn grace() -> UserRef {
    UserRef::new("u2", "Grace").with_email("grace@example.com")
}

fn execution(
    id: &str,
    case: (&str, &str),
    status: StatusRef,
    by: Option<UserRef>,
    when: &str,
    elapsed: Option<f64>,
) -> ExecutionRecord {
    ExecutionRecord {
        id: id.into(),
        name: case.1.into(),
        project: web(),
        test_run: EntityRef::new("r1", "Nightly"),
        test_case: EntityRef::new(case.0, case.1),
        milestone: Some(EntityRef::new("m1", "Beta")),
        configuration: Some(EntityRef::new("cfg1", "Chrome")),
        status,
        executed_by: by,
        executed_at: at(when),
        elapsed_secs: elapsed,
    }
}

fn case(id: &str, name: &str, project: EntityRef, creator: UserRef, automated: bool, when: &str) -> CaseRecord {
    CaseRecord {
        id: id.into(),
        name: name.into(),
        project,
        creator: Some(creator),
        automated,
        created_at: at(when),
    }
}

fn milestone(id: &str, project: EntityRef, started: bool, completed: bool, deleted: bool) -> MilestoneRecord {
    MilestoneRecord {
        id: id.into(),
        name: format!("Milestone {id}"),
        project,
        creator: Some(ada()),
        is_started: started,
        is_completed: completed,
        is_deleted: deleted,
        created_at: at("2024-02-15T00:00:00Z"),
    }
}

fn run(id: &str, project: EntityRef, creator: UserRef, completed: bool, when: &str) -> RunRecord {
    RunRecord {
        id: id.into(),
        name: format!("Run {id}"),
        project,
        milestone: None,
        configuration: None,
        creator: Some(creator),
        is_completed: completed,
        test_count: 3,
        created_at: at(when),
        completed_at: None,
    }
}

/// Executions (all in p1 unless noted):
///
/// | id | case | status | by | at |
/// |----|------|--------|----|----|
/// | e1 | c1 Login | passed | Ada | 2024-03-04 09:00 |
/// | e2 | c1 Login | failed | Ada | 2024-03-05 09:00 |
/// | e3 | c2 Logout | passed | Grace | 2024-03-05 10:00 |
/// | e4 | c1 Login | passed | Grace | 2024-03-12 09:00 |
/// | e5 | c3 Search | blocked | nobody | 2024-03-12 10:00 |
/// | e6 | c9 Sync (p2) | passed | Ada | 2024-03-06 09:00 |
pub fn dataset() -> Dataset {
    let mut sync = execution(
        "e6",
        ("c9", "Sync"),
        StatusRef::passed(),
        Some(ada()),
        "2024-03-06T09:00:00Z",
        Some(1.0),
    );
    sync.project = mobile();
    sync.test_run = EntityRef::new("r9", "Mobile smoke");

    Dataset {
        projects: vec![web(), mobile()],
        executions: vec![
            execution("e1", ("c1", "Login"), StatusRef::passed(), Some(ada()), "2024-03-04T09:00:00Z", Some(10.0)),
            execution("e2", ("c1", "Login"), StatusRef::failed(), Some(ada()), "2024-03-05T09:00:00Z", Some(20.0)),
            execution("e3", ("c2", "Logout"), StatusRef::passed(), Some(grace()), "2024-03-05T10:00:00Z", Some(5.0)),
            execution("e4", ("c1", "Login"), StatusRef::passed(), Some(grace()), "2024-03-12T09:00:00Z", None),
            execution("e5", ("c3", "Search"), StatusRef::blocked(), None, "2024-03-12T10:00:00Z", None),
            sync,
        ],
        runs: vec![
            run("r1", web(), ada(), true, "2024-03-01T08:00:00Z"),
            run("r2", web(), grace(), false, "2024-03-08T08:00:00Z"),
            run("r9", mobile(), grace(), true, "2024-03-02T08:00:00Z"),
        ],
        cases: vec![
            case("c1", "Login", web(), ada(), true, "2024-02-01T00:00:00Z"),
            case("c2", "Logout", web(), grace(), false, "2024-02-02T00:00:00Z"),
            case("c3", "Search", web(), ada(), true, "2024-03-01T00:00:00Z"),
            case("c9", "Sync", mobile(), grace(), false, "2024-02-03T00:00:00Z"),
        ],
        sessions: vec![
            SessionRecord {
                id: "s1".into(),
                name: "Checkout exploration".into(),
                project: web(),
                milestone: None,
                creator: Some(ada()),
                assigned_to: Some(grace()),
                is_completed: true,
                elapsed_secs: Some(600.0),
                created_at: at("2024-03-06T12:00:00Z"),
            },
            SessionRecord {
                id: "s2".into(),
                name: "Search exploration".into(),
                project: web(),
                milestone: None,
                creator: Some(grace()),
                assigned_to: Some(grace()),
                is_completed: false,
                elapsed_secs: None,
                created_at: at("2024-03-07T12:00:00Z"),
            },
        ],
        issues: vec![
            IssueRecord {
                id: "i1".into(),
                name: "Login button misaligned".into(),
                external_id: "JIRA-1".into(),
                status: "Open".into(),
                is_closed: false,
                project: web(),
                creator: Some(ada()),
                created_at: at("2024-03-05T11:00:00Z"),
            },
            IssueRecord {
                id: "i2".into(),
                name: "Logout crash".into(),
                external_id: "JIRA-2".into(),
                status: "Closed".into(),
                is_closed: true,
                project: web(),
                creator: Some(grace()),
                created_at: at("2024-03-06T11:00:00Z"),
            },
        ],
        milestones: vec![
            milestone("m1", web(), true, false, false),
            milestone("m2", web(), true, true, false),
            milestone("m3", web(), false, false, false),
            milestone("m4", web(), true, true, true),
            milestone("m9", mobile(), false, true, false),
        ],
    }
}

pub fn source() -> MemorySource {
    MemorySource::new(dataset())
}

/// The fixture with e1 executed by a real user whose id is `none`.
pub fn source_with_user_named_none() -> MemorySource {
    let mut data = dataset();
    data.executions[0].executed_by = Some(UserRef::new("none", "Nonie"));
    MemorySource::new(data)
}

/// A data source whose backend is down.
pub struct FailingSource;

fn down<T>() -> ReportResult<T> {
    Err(ReportError::upstream("connection refused: db-primary:5432"))
}

#[async_trait]
impl DataSource for FailingSource {
    async fn project_exists(&self, _project_id: &str) -> ReportResult<bool> {
        Ok(true)
    }

    async fn executions(&self, _scope: &RecordScope) -> ReportResult<Vec<ExecutionRecord>> {
        down()
    }

    async fn runs(&self, _scope: &RecordScope) -> ReportResult<Vec<RunRecord>> {
        down()
    }

    async fn cases(&self, _scope: &RecordScope) -> ReportResult<Vec<CaseRecord>> {
        down()
    }

    async fn sessions(&self, _scope: &RecordScope) -> ReportResult<Vec<SessionRecord>> {
        down()
    }

    async fn issues(&self, _scope: &RecordScope) -> ReportResult<Vec<IssueRecord>> {
        down()
    }

    async fn milestones(&self, _scope: &RecordScope) -> ReportResult<Vec<MilestoneRecord>> {
        down()
    }
}
