use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::shift_span::ShiftSpan;

/// Arrival classification, ordered from best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
pub enum LatenessStatus {
    #[serde(rename = "On Time")]
    #[strum(serialize = "On Time")]
    OnTime,

    #[serde(rename = "Late (Grace)")]
    #[strum(serialize = "Late (Grace)")]
    LateGrace,

    #[serde(rename = "Late I")]
    #[strum(serialize = "Late I")]
    LateI,

    #[serde(rename = "Late II")]
    #[strum(serialize = "Late II")]
    LateII,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lateness {
    pub status: LatenessStatus,
    /// Minutes past nominal start, never negative.
    pub minutes: i64,
}

/// Upper bounds (inclusive, in minutes past nominal start) for each label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatenessPolicy {
    pub on_time_max: i64,
    pub grace_max: i64,
    pub late_one_max: i64,
}

impl Default for LatenessPolicy {
    fn default() -> Self {
        Self {
            on_time_max: 5,
            grace_max: 15,
            late_one_max: 30,
        }
    }
}

impl LatenessPolicy {
    /// Time-of-day comparison only. The caller must already know which occurrence of
    /// the shift the arrival belongs to.
    pub fn classify(&self, nominal_start: NaiveTime, arrival: NaiveDateTime) -> Lateness {
        let diff = minutes_of_day(arrival.time()) - minutes_of_day(nominal_start);
        self.classify_minutes(diff)
    }

    /// Classifies against a resolved occurrence. Same-day arrivals use the clock-time
    /// rule; an arrival after midnight on an overnight shift counts from the real start.
    pub fn classify_span(&self, span: &ShiftSpan, arrival: NaiveDateTime) -> Lateness {
        if arrival.date() == span.start.date() {
            self.classify(span.start.time(), arrival)
        } else {
            self.classify_minutes((arrival - span.start).num_minutes())
        }
    }

    pub fn classify_minutes(&self, diff: i64) -> Lateness {
        let status = if diff <= self.on_time_max {
            LatenessStatus::OnTime
        } else if diff <= self.grace_max {
            LatenessStatus::LateGrace
        } else if diff <= self.late_one_max {
            LatenessStatus::LateI
        } else {
            LatenessStatus::LateII
        };

        let minutes = match status {
            LatenessStatus::OnTime => 0,
            _ => diff.max(0),
        };

        Lateness { status, minutes }
    }
}

fn minutes_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}
