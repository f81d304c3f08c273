//! Reporting and analytics engine for test management data.
//!
//! This crate turns report requests into aggregate rows and individual
//! records, providing:
//!
//! - Request validation with every violation reported at once
//! - Grouping by ordered dimensions with per-group metrics
//! - Milestone health and flaky test calculators
//! - Drill-down from one report cell to the records behind it
//! - Share-link filtering of user identity and internal fields
//!
//! # Quick Start
//!
//! ```no_run
//! use testdeck_core::{
//!     Dataset, Dimension, EngineConfig, MemorySource, Metric, ReportRequest, ReportService,
//!     ReportType, ShareLinkMode,
//! };
//!
//! # async fn example() -> testdeck_core::ReportResult<()> {
//! let source = MemorySource::new(Dataset::load("dataset.json")?);
//! let service = ReportService::new(source, EngineConfig::from_env());
//!
//! let request = ReportRequest::new(ReportType::TestExecution)
//!     .with_project("p1")
//!     .with_dimensions([Dimension::User])
//!     .with_metrics([Metric::TestResults, Metric::PassRate]);
//! let page = service.generate(request, ShareLinkMode::Public).await?;
//! println!("{page}");
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! See [`EngineConfig`] for the `TESTDECK_*` environment variables.

pub mod aggregate;
pub mod config;
pub mod dimension;
pub mod drilldown;
pub mod error;
pub mod flaky;
pub mod metrics;
pub mod model;
pub mod request;
pub mod sanitize;
pub mod service;
pub mod source;
pub mod validate;

// Re-export main types
pub use aggregate::{AggregationEngine, MetricValue, ReportPage, ReportRow};
pub use config::EngineConfig;
pub use dimension::{DimensionValue, Dimensioned, NONE_ID, UNASSIGNED_KEY};
pub use drilldown::{
    DrillDownAggregates, DrillDownContext, DrillDownRecord, DrillDownResolver, DrillDownResponse,
    RecordKind, ReportMode,
};
pub use error::{FieldError, ReportError, ReportResult, ValidationErrors};
pub use flaky::{count_status_flips, FlakinessSummary};
pub use metrics::{MilestoneSummary, StatusCount};
pub use model::{
    CaseRecord, EntityRef, ExecutionOutcome, ExecutionRecord, IssueRecord, MilestoneRecord,
    MilestoneSnapshot, RunRecord, SessionRecord, StatusRef, UserRef,
};
pub use request::{
    DateGrouping, Dimension, Metric, PageSize, ReportFamily, ReportRequest, ReportType,
    SortDirection,
};
pub use sanitize::{SensitiveDataFilter, ShareLinkMode};
pub use service::ReportService;
pub use source::{DataSource, Dataset, MemorySource, RecordScope};
pub use validate::{RequestValidator, ValidatedRequest, FORBIDDEN_EXECUTION_PAIRS};
