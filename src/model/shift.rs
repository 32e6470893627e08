use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// "Employee works shift `shift_code` on `date`". Owned by the scheduling module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShiftAssignment {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub shift_code: String,
}

/// Nominal clock-time bounds of a shift code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ShiftDefinition {
    #[schema(example = "M")]
    pub code: String,

    #[schema(example = "22:00:00", value_type = String, format = "time")]
    pub start_time: NaiveTime,

    #[schema(example = "06:00:00", value_type = String, format = "time")]
    pub end_time: NaiveTime,
}

impl ShiftDefinition {
    pub fn new(code: impl Into<String>, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            code: code.into(),
            start_time,
            end_time,
        }
    }

    /// Builds a definition from `HH:MM` or `HH:MM:SS` strings.
    pub fn parse(code: impl Into<String>, start: &str, end: &str) -> Option<Self> {
        Some(Self::new(code, parse_clock_time(start)?, parse_clock_time(end)?))
    }

    /// End earlier than start means the shift crosses midnight.
    pub fn is_overnight(&self) -> bool {
        self.end_time < self.start_time
    }
}

pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}
