//! Metric calculators.
//!
//! Pure functions over immutable snapshots. Deleted milestones are dropped
//! before anything is counted. Percentages are rounded to two decimals by
//! [`percentage`] only, so ordering between two percentages of the same
//! denominator survives rounding.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ExecutionOutcome, ExecutionRecord, MilestoneSnapshot};

/// `part / whole` as a percentage rounded to two decimals; 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn live(milestones: &[MilestoneSnapshot]) -> impl Iterator<Item = &MilestoneSnapshot> {
    milestones.iter().filter(|m| !m.is_deleted)
}

/// Non-deleted milestones.
pub fn total_milestones(milestones: &[MilestoneSnapshot]) -> usize {
    live(milestones).count()
}

/// Non-deleted milestones that are started or completed. Each milestone counts once.
pub fn milestones_with_progress(milestones: &[MilestoneSnapshot]) -> usize {
    live(milestones).filter(|m| m.has_progress()).count()
}

pub fn completed_milestones(milestones: &[MilestoneSnapshot]) -> usize {
    live(milestones).filter(|m| m.is_completed).count()
}

/// Started but not yet completed.
pub fn active_milestones(milestones: &[MilestoneSnapshot]) -> usize {
    live(milestones).filter(|m| m.is_active()).count()
}

/// Share of non-deleted milestones with any progress. Never above 100.
pub fn milestone_progress(milestones: &[MilestoneSnapshot]) -> f64 {
    percentage(
        milestones_with_progress(milestones),
        total_milestones(milestones),
    )
}

/// Share of non-deleted milestones that are completed. Never above progress.
pub fn completion_rate(milestones: &[MilestoneSnapshot]) -> f64 {
    percentage(completed_milestones(milestones), total_milestones(milestones))
}

/// All milestone figures for one group, computed in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneSummary {
    pub total: usize,
    pub with_progress: usize,
    pub completed: usize,
    pub active: usize,
    pub progress: f64,
    pub completion: f64,
}

impl MilestoneSummary {
    pub fn from_snapshots(milestones: &[MilestoneSnapshot]) -> Self {
        let mut summary = Self {
            total: 0,
            with_progress: 0,
            completed: 0,
            active: 0,
            progress: 0.0,
            completion: 0.0,
        };
        for m in live(milestones) {
            summary.total += 1;
            if m.has_progress() {
                summary.with_progress += 1;
            }
            if m.is_completed {
                summary.completed += 1;
            }
            if m.is_active() {
                summary.active += 1;
            }
        }
        summary.progress = percentage(summary.with_progress, summary.total);
        summary.completion = percentage(summary.completed, summary.total);

        debug_assert!(summary.progress <= 100.0);
        debug_assert!(summary.completion <= summary.progress);
        debug_assert!(summary.active + summary.completed <= summary.with_progress);
        summary
    }
}

/// Share of executions that passed.
pub fn pass_rate(outcomes: &[ExecutionOutcome]) -> f64 {
    let passed = outcomes.iter().filter(|o| o.is_success).count();
    percentage(passed, outcomes.len())
}

pub fn passed_count(outcomes: &[ExecutionOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_success).count()
}

pub fn failed_count(outcomes: &[ExecutionOutcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| o.is_failure && !o.is_success)
        .count()
}

/// Sum of the known durations.
pub fn elapsed_total(values: impl IntoIterator<Item = Option<f64>>) -> f64 {
    round2(values.into_iter().flatten().sum())
}

/// Mean of the known durations; 0 when none are known.
pub fn elapsed_average(values: impl IntoIterator<Item = Option<f64>>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0_f64, 0_usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        round2(sum / n as f64)
    }
}

/// Most recent instant, if any.
pub fn last_active(timestamps: impl IntoIterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    timestamps.into_iter().max()
}

/// Executions per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status_id: String,
    pub status: String,
    pub count: usize,
}

/// Status breakdown, largest first, ties by status name.
pub fn status_counts<'a>(
    executions: impl IntoIterator<Item = &'a ExecutionRecord>,
) -> Vec<StatusCount> {
    let mut by_status: BTreeMap<&str, StatusCount> = BTreeMap::new();
    for e in executions {
        by_status
            .entry(e.status.id.as_str())
            .or_insert_with(|| StatusCount {
                status_id: e.status.id.clone(),
                status: e.status.name.clone(),
                count: 0,
            })
            .count += 1;
    }
    let mut counts: Vec<StatusCount> = by_status.into_values().collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(started: bool, completed: bool, deleted: bool) -> MilestoneSnapshot {
        MilestoneSnapshot::new(started, completed, deleted)
    }

    #[test]
    fn started_and_completed_counts_once() {
        let one = [ms(true, true, false)];
        assert_eq!(milestone_progress(&one), 100.0);
        assert_eq!(completion_rate(&one), 100.0);
        assert_eq!(active_milestones(&one), 0);
    }

    #[test]
    fn singleton_groups_are_all_or_nothing() {
        for (s, c) in [(false, false), (true, false), (false, true), (true, true)] {
            let one = [ms(s, c, false)];
            let p = milestone_progress(&one);
            let r = completion_rate(&one);
            assert!(p == 0.0 || p == 100.0, "progress {p}");
            assert!(r == 0.0 || r == 100.0, "completion {r}");
        }
    }

    #[test]
    fn deleted_and_empty_are_zero() {
        let deleted = [ms(true, true, true), ms(true, false, true)];
        assert_eq!(milestone_progress(&deleted), 0.0);
        assert_eq!(completion_rate(&deleted), 0.0);
        assert_eq!(active_milestones(&deleted), 0);

        assert_eq!(milestone_progress(&[]), 0.0);
        assert_eq!(completion_rate(&[]), 0.0);
        assert_eq!(active_milestones(&[]), 0);
    }

    #[test]
    fn mixed_set() {
        let set = [
            ms(true, false, false),
            ms(true, true, false),
            ms(false, false, false),
            ms(false, true, true),
        ];
        let summary = MilestoneSummary::from_snapshots(&set);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.with_progress, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.progress, 66.67);
        assert_eq!(summary.completion, 33.33);
    }

    #[test]
    fn execution_calculators() {
        let at = Utc::now();
        let outcomes = [
            ExecutionOutcome::new(true, false, at),
            ExecutionOutcome::new(false, true, at),
            ExecutionOutcome::new(false, false, at),
            ExecutionOutcome::new(true, false, at),
        ];
        assert_eq!(pass_rate(&outcomes), 50.0);
        assert_eq!(passed_count(&outcomes), 2);
        assert_eq!(failed_count(&outcomes), 1);
        assert_eq!(pass_rate(&[]), 0.0);
    }

    #[test]
    fn elapsed_ignores_unknown_durations() {
        let values = [Some(1.5), None, Some(2.0)];
        assert_eq!(elapsed_total(values), 3.5);
        assert_eq!(elapsed_average(values), 1.75);
        assert_eq!(elapsed_average([None, None]), 0.0);
    }
}
