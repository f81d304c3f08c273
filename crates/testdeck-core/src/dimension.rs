//! Dimension values and how each record kind exposes them.
//!
//! Grouping (aggregation) and filtering (drill-down) both go through
//! [`Dimensioned::dimension_value`], so a drilled cell always re-selects
//! exactly the records that were counted into it.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    CaseRecord, EntityRef, ExecutionRecord, IssueRecord, MilestoneRecord, RunRecord,
    SessionRecord, UserRef,
};
use crate::request::{DateGrouping, Dimension};

/// Id of the bucket holding records that have no value for a dimension.
/// Real entities may also use this id; [`DimensionValue::unassigned`] tells them apart.
pub const NONE_ID: &str = "none";

/// Wire key of the flag marking the none bucket.
pub const UNASSIGNED_KEY: &str = "unassigned";

/// One identified, labeled filter unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionValue {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Bucket start for date-typed dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Set only on the none bucket.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unassigned: bool,
}

impl DimensionValue {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            executed_at: None,
            unassigned: false,
        }
    }

    pub fn id_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            executed_at: None,
            unassigned: false,
        }
    }

    pub fn none() -> Self {
        Self {
            unassigned: true,
            ..Self::new(NONE_ID, "None")
        }
    }

    pub fn is_none_bucket(&self) -> bool {
        self.unassigned
    }

    /// Grouping identity: the id of a real value, `None` for the none bucket.
    pub fn group_id(&self) -> Option<&str> {
        if self.unassigned {
            None
        } else {
            Some(&self.id)
        }
    }

    /// Label used for display and name-based sorting.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn entity(entity: &EntityRef) -> Self {
        Self::new(entity.id.clone(), entity.name.clone())
    }

    pub(crate) fn user(user: &UserRef) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            executed_at: None,
            unassigned: false,
        }
    }

    /// Date bucket containing `at`.
    pub fn date_bucket(grouping: DateGrouping, at: DateTime<Utc>) -> Self {
        let start = bucket_start(grouping, at);
        Self {
            id: start.format("%Y-%m-%d").to_string(),
            name: Some(bucket_label(grouping, start)),
            executed_at: Some(start),
            unassigned: false,
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// First instant of the bucket containing `at`.
pub fn bucket_start(grouping: DateGrouping, at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let start = match grouping {
        DateGrouping::Daily => date,
        DateGrouping::Weekly => date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .unwrap_or(date),
        DateGrouping::Monthly => date.with_day(1).unwrap_or(date),
        DateGrouping::Quarterly => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
        DateGrouping::Annually => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    };
    midnight(start)
}

/// First instant after the bucket starting at `start`.
pub fn bucket_end(grouping: DateGrouping, start: DateTime<Utc>) -> DateTime<Utc> {
    let date = start.date_naive();
    let next = match grouping {
        DateGrouping::Daily => date.checked_add_days(Days::new(1)),
        DateGrouping::Weekly => date.checked_add_days(Days::new(7)),
        DateGrouping::Monthly => date.checked_add_months(Months::new(1)),
        DateGrouping::Quarterly => date.checked_add_months(Months::new(3)),
        DateGrouping::Annually => date.checked_add_months(Months::new(12)),
    };
    next.map(midnight).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn bucket_label(grouping: DateGrouping, start: DateTime<Utc>) -> String {
    match grouping {
        DateGrouping::Daily => start.format("%Y-%m-%d").to_string(),
        DateGrouping::Weekly => format!("Week of {}", start.format("%Y-%m-%d")),
        DateGrouping::Monthly => start.format("%b %Y").to_string(),
        DateGrouping::Quarterly => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
        DateGrouping::Annually => start.year().to_string(),
    }
}

/// A record that can be grouped and filtered by dimensions.
pub trait Dimensioned {
    /// Instant used for date-range scoping and the `date` dimension.
    fn timestamp(&self) -> DateTime<Utc>;

    fn project(&self) -> &EntityRef;

    /// Value for one dimension. `None` when the dimension does not apply or
    /// the record has no value (grouped under [`DimensionValue::none`]).
    fn dimension_value(&self, dimension: Dimension, grouping: DateGrouping)
        -> Option<DimensionValue>;

    /// Value or the `none` bucket.
    fn dimension_key(&self, dimension: Dimension, grouping: DateGrouping) -> DimensionValue {
        self.dimension_value(dimension, grouping)
            .unwrap_or_else(DimensionValue::none)
    }
}

fn opt_entity(entity: &Option<EntityRef>) -> Option<DimensionValue> {
    entity.as_ref().map(DimensionValue::entity)
}

fn opt_user(user: &Option<UserRef>) -> Option<DimensionValue> {
    user.as_ref().map(DimensionValue::user)
}

impl Dimensioned for ExecutionRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.executed_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::User => opt_user(&self.executed_by),
            Dimension::Status => Some(DimensionValue::new(
                self.status.id.clone(),
                self.status.name.clone(),
            )),
            Dimension::TestRun => Some(DimensionValue::entity(&self.test_run)),
            Dimension::TestCase => Some(DimensionValue::entity(&self.test_case)),
            Dimension::Milestone => opt_entity(&self.milestone),
            Dimension::Configuration => opt_entity(&self.configuration),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.executed_at)),
            Dimension::Creator => None,
        }
    }
}

impl Dimensioned for RunRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::TestRun => Some(DimensionValue::new(self.id.clone(), self.name.clone())),
            Dimension::Milestone => opt_entity(&self.milestone),
            Dimension::Configuration => opt_entity(&self.configuration),
            Dimension::Creator => opt_user(&self.creator),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.created_at)),
            Dimension::User | Dimension::Status | Dimension::TestCase => None,
        }
    }
}

impl Dimensioned for CaseRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::TestCase => Some(DimensionValue::new(self.id.clone(), self.name.clone())),
            Dimension::Creator => opt_user(&self.creator),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.created_at)),
            _ => None,
        }
    }
}

impl Dimensioned for SessionRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::User => opt_user(&self.assigned_to),
            Dimension::Status => Some(if self.is_completed {
                DimensionValue::new("completed", "Completed")
            } else {
                DimensionValue::new("in-progress", "In Progress")
            }),
            Dimension::Milestone => opt_entity(&self.milestone),
            Dimension::Creator => opt_user(&self.creator),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.created_at)),
            _ => None,
        }
    }
}

impl Dimensioned for IssueRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::Status => Some(DimensionValue::new(
                self.status.to_lowercase(),
                self.status.clone(),
            )),
            Dimension::Creator => opt_user(&self.creator),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.created_at)),
            _ => None,
        }
    }
}

impl Dimensioned for MilestoneRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn project(&self) -> &EntityRef {
        &self.project
    }

    fn dimension_value(
        &self,
        dimension: Dimension,
        grouping: DateGrouping,
    ) -> Option<DimensionValue> {
        match dimension {
            Dimension::Milestone => Some(DimensionValue::new(self.id.clone(), self.name.clone())),
            Dimension::Creator => opt_user(&self.creator),
            Dimension::Project => Some(DimensionValue::entity(&self.project)),
            Dimension::Date => Some(DimensionValue::date_bucket(grouping, self.created_at)),
            _ => None,
        }
    }
}
