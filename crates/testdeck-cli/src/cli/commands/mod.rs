use std::path::Path;

use anyhow::Context;
use serde_json::json;
use testdeck_core::{EngineConfig, ReportError, ReportResult};

use super::args::{Cli, Command};
use crate::exit_codes;

pub mod drilldown;
pub mod report;
pub mod validate;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = match engine_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return Ok(report_error(&e)),
    };
    match cli.cmd {
        Command::Validate(args) => validate::run(args, &config),
        Command::Report(args) => report::run(args, config).await,
        Command::Drilldown(args) => drilldown::run(args, config).await,
    }
}

/// File config (if any), then `TESTDECK_*` overrides.
pub(crate) fn engine_config(path: Option<&Path>) -> ReportResult<EngineConfig> {
    let base = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(base.merge_env())
}

pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an engine error and map it to an exit code. Validation errors go to
/// stdout as JSON so callers can parse them.
pub(crate) fn report_error(err: &ReportError) -> i32 {
    match err.validation_errors() {
        Some(errors) => {
            let body = json!({ "valid": false, "errors": errors });
            match serde_json::to_string_pretty(&body) {
                Ok(text) => println!("{text}"),
                Err(_) => eprintln!("{}", error_line(err)),
            }
        }
        None => {
            tracing::error!(exit_code = err.exit_code(), error = %err, "command failed");
            eprintln!("{}", error_line(err));
        }
    }
    match err {
        ReportError::Validation(_) => exit_codes::VALIDATION_FAILED,
        ReportError::NotFound { .. } | ReportError::Config { .. } => exit_codes::CONFIG_ERROR,
        ReportError::Upstream { .. } => exit_codes::UPSTREAM_ERROR,
    }
}

/// Requester-facing line; source details only reach the log.
fn error_line(err: &ReportError) -> String {
    format!("error: {}", err.public_message())
}
