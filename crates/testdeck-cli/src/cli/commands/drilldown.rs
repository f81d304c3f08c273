use testdeck_core::{Dataset, DrillDownContext, EngineConfig, MemorySource, ReportService};

use super::{print_json, read_input, report_error};
use crate::cli::args::DrillDownArgs;
use crate::exit_codes;

pub async fn run(args: DrillDownArgs, config: EngineConfig) -> anyhow::Result<i32> {
    let raw = read_input(&args.context)?;
    let context = match DrillDownContext::from_json(&raw) {
        Ok(context) => context,
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
    match service
        .drill_down(&context, args.offset, args.limit, args.share.into())
        .await
    {
        Ok(output) => {
            print_json(&output)?;
            Ok(exit_codes::OK)
        }
        Err(e) => Ok(report_error(&e)),
    }
}
