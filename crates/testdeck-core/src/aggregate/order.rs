//! Row ordering and pagination.

use std::cmp::Ordering;

use super::row::{ReportPage, ReportRow};
use crate::request::{Dimension, Metric, PageSize, ReportFamily, SortDirection};
use crate::validate::ValidatedRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortKey {
    Dimension(Dimension),
    Metric(Metric),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Explicit `sortColumn`, else the report's default order.
    pub fn for_request(validated: &ValidatedRequest, dimensions: &[Dimension]) -> Option<Self> {
        let request = validated.request();
        if let Some(column) = request.sort_column.as_deref() {
            let key = dimensions
                .iter()
                .find(|d| d.as_str() == column)
                .map(|d| SortKey::Dimension(*d))
                .or_else(|| {
                    validated
                        .metrics()
                        .iter()
                        .find(|m| m.matches_column(column))
                        .map(|m| SortKey::Metric(*m))
                })?;
            return Some(Self {
                key,
                direction: request.sort_direction.unwrap_or_default(),
            });
        }

        let direction = request.sort_direction;
        if dimensions.contains(&Dimension::Date) {
            return Some(Self {
                key: SortKey::Dimension(Dimension::Date),
                direction: direction.unwrap_or(SortDirection::Asc),
            });
        }
        if request.report_type.family() == ReportFamily::Flaky
            && validated.metrics().contains(&Metric::StatusFlips)
        {
            return Some(Self {
                key: SortKey::Metric(Metric::StatusFlips),
                direction: direction.unwrap_or(SortDirection::Desc),
            });
        }
        dimensions.first().map(|d| Self {
            key: SortKey::Dimension(*d),
            direction: direction.unwrap_or(SortDirection::Asc),
        })
    }
}

#[derive(Debug, PartialEq)]
enum SortValue {
    Number(f64),
    Text(String, String),
}

impl SortValue {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Text(a, a_id), Self::Text(b, b_id)) => a.cmp(b).then_with(|| a_id.cmp(b_id)),
            (Self::Number(_), Self::Text(..)) => Ordering::Less,
            (Self::Text(..), Self::Number(_)) => Ordering::Greater,
        }
    }
}

fn sort_value(row: &ReportRow, key: SortKey) -> Option<SortValue> {
    match key {
        SortKey::Dimension(dimension) => {
            let value = row.dimension(dimension)?;
            if value.is_none_bucket() {
                return None;
            }
            match value.executed_at {
                Some(at) => Some(SortValue::Number(at.timestamp_millis() as f64)),
                None => Some(SortValue::Text(
                    value.label().to_lowercase(),
                    value.id.clone(),
                )),
            }
        }
        SortKey::Metric(metric) => row.metric(metric)?.sort_key().map(SortValue::Number),
    }
}

/// Stable sort; rows without a value for the key go last in either direction.
pub(crate) fn sort_rows(rows: &mut [ReportRow], spec: Option<SortSpec>) {
    let Some(spec) = spec else {
        return;
    };
    rows.sort_by(|a, b| {
        match (sort_value(a, spec.key), sort_value(b, spec.key)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = x.compare(&y);
                match spec.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    });
}

pub(crate) fn paginate(rows: Vec<ReportRow>, page: u32, page_size: PageSize) -> ReportPage {
    let total = rows.len();
    match page_size {
        PageSize::All => ReportPage {
            results: rows,
            total_count: total,
            page_count: usize::from(total > 0),
            page,
            page_size,
        },
        PageSize::Count(size) => {
            let size = size.max(1) as usize;
            let start = (page.max(1) as usize - 1).saturating_mul(size);
            ReportPage {
                results: rows.into_iter().skip(start).take(size).collect(),
                total_count: total,
                page_count: total.div_ceil(size),
                page,
                page_size,
            }
        }
    }
}
