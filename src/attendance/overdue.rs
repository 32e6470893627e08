use chrono::{Duration, NaiveDateTime};

use super::duration::{format_hm, format_remaining};
use super::shift_span::ShiftSpan;
use crate::model::session::OpenSession;
use crate::model::shift::ShiftDefinition;

/// Result of comparing an open session against its scheduled end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueCheck {
    pub is_overdue: bool,
    pub expected_end: NaiveDateTime,
    /// First instant at which auto-checkout is allowed.
    pub eligible_at: NaiveDateTime,
    /// `expected_end - now`, negative once the shift end has passed.
    pub remaining: Duration,
}

impl OverdueCheck {
    pub fn remaining_label(&self) -> String {
        format_remaining(self.remaining)
    }

    /// Time left before auto-checkout becomes allowed, zero once eligible.
    pub fn until_eligible(&self, now: NaiveDateTime) -> Duration {
        (self.eligible_at - now).max(Duration::zero())
    }

    pub fn until_eligible_label(&self, now: NaiveDateTime) -> String {
        format_hm(self.until_eligible(now))
    }
}

/// Pure: the occurrence is resolved from the session's own shift date, never from `now`.
pub fn detect_overdue(
    shift: &ShiftDefinition,
    session: &OpenSession,
    now: NaiveDateTime,
    grace: Duration,
) -> OverdueCheck {
    let span = ShiftSpan::resolve(shift, session.shift_date);
    let eligible_at = span.end + grace;

    OverdueCheck {
        is_overdue: now > eligible_at,
        expected_end: span.end,
        eligible_at,
        remaining: span.end - now,
    }
}
