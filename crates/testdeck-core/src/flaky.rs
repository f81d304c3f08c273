//! Flaky test detection.
//!
//! A flip is a change between pass and fail across consecutive *definitive*
//! executions of the same test case. Blocked/skipped results are skipped, so
//! they neither create nor break a flip.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::round2;
use crate::model::ExecutionOutcome;

/// Count pass/fail transitions in chronologically ordered outcomes.
pub fn count_status_flips(executions: &[ExecutionOutcome]) -> u32 {
    let mut last: Option<bool> = None;
    let mut flips = 0;
    for outcome in executions {
        let Some(current) = outcome.definitive() else {
            continue;
        };
        if let Some(previous) = last {
            if previous != current {
                flips += 1;
            }
        }
        last = Some(current);
    }
    flips
}

/// Flakiness figures for one test case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakinessSummary {
    pub status_flips: u32,
    pub definitive_executions: usize,
    /// Flips per possible flip (`definitive - 1`), as a percentage.
    pub flip_rate: f64,
    pub last_executed: Option<DateTime<Utc>>,
}

/// Summarize outcomes; they are sorted chronologically first.
pub fn summarize(outcomes: &[ExecutionOutcome]) -> FlakinessSummary {
    let mut ordered = outcomes.to_vec();
    ordered.sort_by_key(|o| o.executed_at);

    let status_flips = count_status_flips(&ordered);
    let definitive_executions = ordered.iter().filter(|o| o.is_definitive()).count();
    let flip_rate = if definitive_executions < 2 {
        0.0
    } else {
        round2(f64::from(status_flips) * 100.0 / (definitive_executions - 1) as f64)
    };

    FlakinessSummary {
        status_flips,
        definitive_executions,
        flip_rate,
        last_executed: ordered.last().map(|o| o.executed_at),
    }
}
