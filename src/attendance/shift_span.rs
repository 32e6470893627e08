use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::model::shift::ShiftDefinition;

/// Absolute bounds of one occurrence of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ShiftSpan {
    /// Resolves the occurrence of `shift` that starts on `date`.
    ///
    /// Every call site that needs to know when a shift ends goes through here, so the
    /// midnight rollover is decided in exactly one place: when the end clock time is
    /// earlier than the start clock time the end lands on `date + 1`.
    pub fn resolve(shift: &ShiftDefinition, date: NaiveDate) -> Self {
        let start = date.and_time(shift.start_time);
        let end_date = if shift.is_overnight() {
            date.checked_add_days(Days::new(1)).unwrap_or(date)
        } else {
            date
        };

        Self {
            start,
            end: end_date.and_time(shift.end_time),
        }
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Timelike};

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_shift_ends_same_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let span = ShiftSpan::resolve(&ShiftDefinition::parse("P", "08:00", "16:00").unwrap(), date);
        assert_eq!(span.start, at(date, 8, 0));
        assert_eq!(span.end, at(date, 16, 0));
        assert_eq!(span.end - span.start, chrono::Duration::hours(8));
    }

    #[test]
    fn night_shift_rolls_to_next_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let span = ShiftSpan::resolve(&ShiftDefinition::parse("M", "22:00", "06:00").unwrap(), date);
        assert_eq!(span.start, at(date, 22, 0));
        assert_eq!(span.end, at(next, 6, 0));
        assert!(span.contains(at(next, 0, 10)));
        assert!(!span.contains(at(next, 6, 0)));
    }

    #[test]
    fn rollover_crosses_month_and_year_ends() {
        let new_year_eve = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let span =
            ShiftSpan::resolve(&ShiftDefinition::parse("M", "21:00", "07:00").unwrap(), new_year_eve);
        assert_eq!(span.end.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        let leap = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let span = ShiftSpan::resolve(&ShiftDefinition::parse("M", "21:00", "07:00").unwrap(), leap);
        assert_eq!(span.end.date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn end_day_follows_clock_order_for_every_hour_pair() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next = date.succ_opt().unwrap();

        for start_h in 0..24 {
            for end_h in 0..24 {
                for end_m in [0, 30] {
                    let start = NaiveTime::from_hms_opt(start_h, 0, 0).unwrap();
                    let end = NaiveTime::from_hms_opt(end_h, end_m, 0).unwrap();
                    let span = ShiftSpan::resolve(&ShiftDefinition::new("S", start, end), date);

                    let expected_day = if end < start { next } else { date };
                    assert_eq!(span.end.date(), expected_day, "{start}-{end}");
                    assert_eq!(span.start.date(), date);
                    assert_eq!(span.end.hour(), end_h);
                    assert!(span.end >= span.start);
                }
            }
        }
    }
}
