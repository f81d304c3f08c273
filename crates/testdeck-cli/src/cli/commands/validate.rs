use serde_json::json;
use testdeck_core::{EngineConfig, ReportError, ReportRequest, RequestValidator};

use super::{print_json, read_input, report_error};
use crate::cli::args::ValidateArgs;
use crate::exit_codes;

pub fn run(args: ValidateArgs, config: &EngineConfig) -> anyhow::Result<i32> {
    let raw = read_input(&args.request)?;
    let request = match ReportRequest::from_json(&raw) {
        Ok(request) => request,
        Err(e) => return Ok(report_error(&e)),
    };
    match RequestValidator::new(config).validate(request) {
        Ok(validated) => {
            print_json(&json!({
                "valid": true,
                "reportType": validated.request().report_type,
                "metrics": validated.metrics(),
                "pageSize": validated.page_size(),
            }))?;
            Ok(exit_codes::OK)
        }
        Err(errors) => Ok(report_error(&ReportError::from(errors))),
    }
}
