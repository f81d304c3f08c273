use testdeck_core::{Dataset, EngineConfig, MemorySource, ReportRequest, ReportService};

use super::{print_json, read_input, report_error};
use crate::cli::args::ReportArgs;
use crate::exit_codes;

pub async fn run(args: ReportArgs, config: EngineConfig) -> anyhow::Result<i32> {
    let raw = read_input(&args.request)?;
    let request = match ReportRequest::from_json(&raw) {
        Ok(request) => request,
        Err(e) => return Ok(report_error(&e)),
    };
    let dataset = match Dataset::load(&args.data) {
        Ok(dataset) => dataset,
        Err(e) => return Ok(report_error(&e)),
    };

    let config = if args.anonymize {
        config.with_anonymize_public(true)
    } else {
        config
    };
    let service = ReportService::new(MemorySource::new(dataset), config);
    match service.generate(request, args.share.into()).await {
        Ok(output) => {
            print_json(&output)?;
            Ok(exit_codes::OK)
        }
        Err(e) => Ok(report_error(&e)),
    }
}
