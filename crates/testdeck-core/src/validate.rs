//! Report request validation.
//!
//! Every rule runs on every request and all violations are returned together,
//! so a client can fix the whole request in one round trip. Nothing here
//! touches the data source.

use std::collections::BTreeSet;

use tracing::debug;

use crate::aggregate::flaky_dimensions;
use crate::config::EngineConfig;
use crate::error::ValidationErrors;
use crate::request::{Dimension, Metric, PageSize, ReportFamily, ReportRequest};

/// Dimension pairs that execution reports refuse to combine. Each pair is
/// checked as a subset of the requested dimensions, whatever else is selected.
pub const FORBIDDEN_EXECUTION_PAIRS: [(Dimension, Dimension); 15] = [
    (Dimension::TestRun, Dimension::TestCase),
    (Dimension::Status, Dimension::TestCase),
    (Dimension::Status, Dimension::TestRun),
    (Dimension::Status, Dimension::Milestone),
    (Dimension::User, Dimension::TestRun),
    (Dimension::User, Dimension::Milestone),
    (Dimension::User, Dimension::TestCase),
    (Dimension::Configuration, Dimension::TestRun),
    (Dimension::Configuration, Dimension::TestCase),
    (Dimension::Configuration, Dimension::Milestone),
    (Dimension::Date, Dimension::TestRun),
    (Dimension::Date, Dimension::TestCase),
    (Dimension::Date, Dimension::Milestone),
    (Dimension::TestRun, Dimension::Milestone),
    (Dimension::TestCase, Dimension::Milestone),
];

/// A request that passed every rule. Only the validator constructs one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    request: ReportRequest,
    metrics: Vec<Metric>,
    page_size: PageSize,
}

impl ValidatedRequest {
    pub fn request(&self) -> &ReportRequest {
        &self.request
    }

    /// Metrics to compute; pre-aggregated kinds fall back to their full set.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.request.dimensions
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    default_page_size: u32,
    max_page_size: u32,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl RequestValidator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub fn validate(&self, request: ReportRequest) -> Result<ValidatedRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_dates(&request, &mut errors);
        self.check_paging(&request, &mut errors);
        check_catalog(&request, &mut errors);
        check_counts(&request, &mut errors);
        check_last_active(&request, &mut errors);
        check_forbidden_pairs(&request, &mut errors);
        check_sort(&request, &mut errors);

        if !errors.is_empty() {
            debug!(
                report_type = %request.report_type,
                violations = errors.len(),
                "report request rejected"
            );
            return Err(errors);
        }

        let metrics = if request.metrics.is_empty() && request.report_type.is_pre_aggregated() {
            request.report_type.supported_metrics().to_vec()
        } else {
            request.metrics.clone()
        };
        let page_size = request
            .page_size
            .unwrap_or(PageSize::Count(self.default_page_size));

        Ok(ValidatedRequest {
            request,
            metrics,
            page_size,
        })
    }

    fn check_paging(&self, request: &ReportRequest, errors: &mut ValidationErrors) {
        if request.page == 0 {
            errors.push("page", "Page must be 1 or greater");
        }
        match request.page_size {
            Some(PageSize::Count(0)) => {
                errors.push("pageSize", "Page size must be a positive number or \"All\"");
            }
            Some(PageSize::Count(n)) if n > self.max_page_size => {
                errors.push(
                    "pageSize",
                    format!("Page size must not exceed {}", self.max_page_size),
                );
            }
            _ => {}
        }
    }
}

fn check_dates(request: &ReportRequest, errors: &mut ValidationErrors) {
    match (request.start_date, request.end_date) {
        (None, Some(_)) => {
            errors.push("startDate", "Start date is required when an end date is set");
        }
        (Some(start), Some(end)) if start > end => {
            errors.push("endDate", "End date must not be before the start date");
        }
        _ => {}
    }
}

fn check_catalog(request: &ReportRequest, errors: &mut ValidationErrors) {
    let report_type = request.report_type;
    let mut seen = BTreeSet::new();
    for dimension in &request.dimensions {
        if !seen.insert(*dimension) {
            errors.push(
                "dimensions",
                format!("Dimension '{dimension}' is selected more than once"),
            );
        } else if !report_type.supports_dimension(*dimension) {
            errors.push(
                "dimensions",
                format!("Dimension '{dimension}' is not available for the '{report_type}' report"),
            );
        }
    }

    let mut seen = Vec::new();
    for metric in &request.metrics {
        if seen.contains(metric) {
            errors.push(
                "metrics",
                format!("Metric '{metric}' is selected more than once"),
            );
        } else if !report_type.supports_metric(*metric) {
            errors.push(
                "metrics",
                format!("Metric '{metric}' is not available for the '{report_type}' report"),
            );
        }
        seen.push(*metric);
    }
}

fn check_counts(request: &ReportRequest, errors: &mut ValidationErrors) {
    if request.report_type.is_pre_aggregated() {
        return;
    }
    if request.metrics.is_empty() {
        errors.push("metrics", "At least one metric is required");
    }
    if request.metrics.len() > 1 && request.dimensions.is_empty() {
        errors.push(
            "dimensions",
            "At least one dimension is required when selecting multiple metrics",
        );
    }
}

fn check_last_active(request: &ReportRequest, errors: &mut ValidationErrors) {
    if !request.metrics.contains(&Metric::LastActiveDate) {
        return;
    }
    if request.report_type.is_user_engagement() && request.dimensions.contains(&Dimension::Date) {
        errors.push(
            "dimensions",
            "The 'lastActiveDate' metric cannot be used with the 'date' dimension",
        );
    }
    let only_user: BTreeSet<Dimension> = request.dimensions.iter().copied().collect();
    if only_user != BTreeSet::from([Dimension::User]) {
        errors.push(
            "dimensions",
            "The 'lastActiveDate' metric can only be used with the 'user' dimension",
        );
    }
}

fn check_forbidden_pairs(request: &ReportRequest, errors: &mut ValidationErrors) {
    if !request.report_type.is_execution() {
        return;
    }
    let selected: BTreeSet<Dimension> = request.dimensions.iter().copied().collect();
    for (a, b) in forbidden_pairs_in(&selected) {
        errors.push(
            "dimensions",
            format!("The '{a}' and '{b}' dimensions cannot be used together"),
        );
    }
}

/// Forbidden pairs fully contained in `selected`, in table order.
pub fn forbidden_pairs_in(selected: &BTreeSet<Dimension>) -> Vec<(Dimension, Dimension)> {
    FORBIDDEN_EXECUTION_PAIRS
        .iter()
        .copied()
        .filter(|(a, b)| selected.contains(a) && selected.contains(b))
        .collect()
}

fn check_sort(request: &ReportRequest, errors: &mut ValidationErrors) {
    let Some(column) = request.sort_column.as_deref() else {
        return;
    };
    let dimensions = if request.report_type.family() == ReportFamily::Flaky {
        flaky_dimensions(&request.dimensions)
    } else {
        request.dimensions.clone()
    };
    let by_dimension = dimensions.iter().any(|d| d.as_str() == column);
    let metrics: &[Metric] = if request.metrics.is_empty() {
        request.report_type.supported_metrics()
    } else {
        &request.metrics
    };
    let by_metric = metrics.iter().any(|m| m.matches_column(column));
    if !by_dimension && !by_metric {
        errors.push(
            "sortColumn",
            format!("Cannot sort by '{column}': it is not a selected dimension or metric"),
        );
    }
}
