//! Pure recurrence arithmetic for fired reminders.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Months, Utc};

use super::model::Repeat;

/// The state a reminder moves to after an occurrence fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextOccurrence {
    pub remind_at: DateTime<Utc>,
    pub done: bool,
}

/// Advance a reminder past the occurrence that just fired.
///
/// Advancement is always relative to the prior `remind_at`, never to the
/// current time: a reminder that sat due for three periods moves one period
/// per cycle until it catches up. Monthly arithmetic clamps to the end of
/// the target month (Jan 31 + 1 month = Feb 28/29), which is the behavior
/// of `chrono::Months`.
pub fn next_occurrence(remind_at: DateTime<Utc>, repeat: Repeat) -> Result<NextOccurrence> {
    let advanced = match repeat {
        Repeat::None => return Ok(NextOccurrence { remind_at, done: true }),
        Repeat::Daily => remind_at.checked_add_days(Days::new(1)),
        Repeat::Weekly => remind_at.checked_add_days(Days::new(7)),
        Repeat::Monthly => remind_at.checked_add_months(Months::new(1)),
    };

    // Fail closed on overflow: the caller must leave the reminder unmutated.
    let remind_at = advanced
        .with_context(|| format!("date overflow advancing {} reminder from {remind_at}", repeat.as_str()))?;

    Ok(NextOccurrence { remind_at, done: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_none_is_terminal() {
        let next = next_occurrence(at(2024, 1, 1), Repeat::None).unwrap();
        assert!(next.done);
        assert_eq!(next.remind_at, at(2024, 1, 1));
    }

    #[test]
    fn test_daily_advances_one_day() {
        let next = next_occurrence(at(2024, 1, 1), Repeat::Daily).unwrap();
        assert!(!next.done);
        assert_eq!(next.remind_at, at(2024, 1, 2));
    }

    #[test]
    fn test_weekly_advances_seven_days() {
        let next = next_occurrence(at(2024, 2, 26), Repeat::Weekly).unwrap();
        assert!(!next.done);
        assert_eq!(next.remind_at, at(2024, 3, 4));
    }

    #[test]
    fn test_monthly_advances_one_month() {
        let next = next_occurrence(at(2024, 3, 15), Repeat::Monthly).unwrap();
        assert_eq!(next.remind_at, at(2024, 4, 15));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        // Jan 31 has no counterpart in February: clamp, don't roll over.
        let next = next_occurrence(at(2023, 1, 31), Repeat::Monthly).unwrap();
        assert_eq!(next.remind_at, at(2023, 2, 28));

        // Leap year keeps the 29th.
        let next = next_occurrence(at(2024, 1, 31), Repeat::Monthly).unwrap();
        assert_eq!(next.remind_at, at(2024, 2, 29));

        let next = next_occurrence(at(2024, 3, 31), Repeat::Monthly).unwrap();
        assert_eq!(next.remind_at, at(2024, 4, 30));
    }

    #[test]
    fn test_daily_preserves_time_of_day() {
        let start = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
        let next = next_occurrence(start, Repeat::Daily).unwrap();
        assert_eq!(next.remind_at, Utc.with_ymd_and_hms(2024, 7, 1, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_overflow_fails_closed() {
        let near_max = DateTime::<Utc>::MAX_UTC;
        assert!(next_occurrence(near_max, Repeat::Daily).is_err());
        assert!(next_occurrence(near_max, Repeat::Monthly).is_err());
    }
}
