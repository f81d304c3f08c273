//! Report service: validation, aggregation, drill-down and share filtering
//! behind one entry point.

use serde::Serialize;
use serde_json::Value;
use tracing::{info_span, warn, Instrument};

use crate::aggregate::{AggregationEngine, ReportPage};
use crate::config::EngineConfig;
use crate::drilldown::{DrillDownContext, DrillDownResolver, DrillDownResponse};
use crate::error::{ReportError, ReportResult};
use crate::request::ReportRequest;
use crate::sanitize::{SensitiveDataFilter, ShareLinkMode};
use crate::source::DataSource;
use crate::validate::{RequestValidator, ValidatedRequest};

pub struct ReportService<S> {
    source: S,
    config: EngineConfig,
    validator: RequestValidator,
    engine: AggregationEngine,
    resolver: DrillDownResolver,
}

impl<S: DataSource> ReportService<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            validator: RequestValidator::new(&config),
            engine: AggregationEngine::new(config.clone()),
            resolver: DrillDownResolver::new(config.clone()),
            source,
            config,
        }
    }

    pub fn validate(&self, request: ReportRequest) -> ReportResult<ValidatedRequest> {
        self.validator.validate(request).map_err(|errors| {
            warn!(errors = %errors, "rejected report request");
            ReportError::from(errors)
        })
    }

    /// Validated, unfiltered page.
    pub async fn report_page(&self, request: ReportRequest) -> ReportResult<ReportPage> {
        let span = info_span!(
            "report",
            report_type = %request.report_type,
            project_id = request.project_id.as_deref().unwrap_or("*")
        );
        async {
            let validated = self.validate(request)?;
            self.engine
                .run(&validated, &self.source)
                .await
                .map_err(log_failure)
        }
        .instrument(span)
        .await
    }

    /// Report page as JSON, filtered for `mode`.
    pub async fn generate(&self, request: ReportRequest, mode: ShareLinkMode) -> ReportResult<Value> {
        let page = self.report_page(request).await?;
        self.render(&page, mode)
    }

    pub async fn drill_down_records(
        &self,
        context: &DrillDownContext,
        offset: usize,
        limit: Option<u32>,
    ) -> ReportResult<DrillDownResponse> {
        let span = info_span!(
            "drilldown",
            report_type = %context.report_type,
            metric = %context.metric_id,
            offset
        );
        self.resolver
            .resolve(context, offset, limit, &self.source)
            .instrument(span)
            .await
            .map_err(log_failure)
    }

    /// Drill-down response as JSON, filtered for `mode`.
    pub async fn drill_down(
        &self,
        context: &DrillDownContext,
        offset: usize,
        limit: Option<u32>,
        mode: ShareLinkMode,
    ) -> ReportResult<Value> {
        let response = self.drill_down_records(context, offset, limit).await?;
        self.render(&response, mode)
    }

    fn render<T: Serialize>(&self, output: &T, mode: ShareLinkMode) -> ReportResult<Value> {
        let value = serde_json::to_value(output)
            .map_err(|e| ReportError::upstream(format!("failed to encode output: {e}")))?;
        let filter = SensitiveDataFilter::new(mode).with_anonymize(self.config.anonymize_public);
        Ok(filter.filter(value))
    }
}

fn log_failure(err: ReportError) -> ReportError {
    if let ReportError::Upstream { message } = &err {
        warn!(message = %message, "data source failed");
    }
    err
}
