//! Calendar helpers for relative cutoffs such as "the last month". Descriptors reach
//! them through `$dateSubtract`/`$dateAdd`; the engine itself never reads the wall clock.

use bson::DateTime;
use chrono::{DateTime as ChronoDateTime, Months, TimeDelta, Utc};
use std::str::FromStr;

use crate::errors::DbError;

/// Units for [`shift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl FromStr for DateUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "year" => Self::Year,
            "quarter" => Self::Quarter,
            "month" => Self::Month,
            "week" => Self::Week,
            "day" => Self::Day,
            "hour" => Self::Hour,
            "minute" => Self::Minute,
            "second" => Self::Second,
            "millisecond" => Self::Millisecond,
            other => return Err(format!("unknown date unit {other:?}")),
        })
    }
}

/// Moves `instant` by `amount` units; a negative amount moves it back. Calendar units
/// (year, quarter, month) clamp the day of month to the length of the target month,
/// so 31 March minus one month is 28/29 February. Returns `None` on overflow.
#[must_use]
pub fn shift(instant: DateTime, unit: DateUnit, amount: i64) -> Option<DateTime> {
    let at: ChronoDateTime<Utc> = instant.to_chrono();
    let by_months = |n: i64| {
        let m = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
        if n >= 0 { at.checked_add_months(m) } else { at.checked_sub_months(m) }
    };
    let by_delta = |d: Option<TimeDelta>| d.and_then(|d| at.checked_add_signed(d));
    let moved = match unit {
        DateUnit::Year => by_months(amount.checked_mul(12)?),
        DateUnit::Quarter => by_months(amount.checked_mul(3)?),
        DateUnit::Month => by_months(amount),
        DateUnit::Week => by_delta(TimeDelta::try_weeks(amount)),
        DateUnit::Day => by_delta(TimeDelta::try_days(amount)),
        DateUnit::Hour => by_delta(TimeDelta::try_hours(amount)),
        DateUnit::Minute => by_delta(TimeDelta::try_minutes(amount)),
        DateUnit::Second => by_delta(TimeDelta::try_seconds(amount)),
        DateUnit::Millisecond => by_delta(TimeDelta::try_milliseconds(amount)),
    }?;
    Some(DateTime::from_chrono(moved))
}

/// The instant `months` calendar months before `instant`.
#[must_use]
pub fn months_before(instant: DateTime, months: u32) -> Option<DateTime> {
    shift(instant, DateUnit::Month, -i64::from(months))
}

/// Parses an RFC 3339 timestamp such as `2023-07-05T14:00:00Z`.
///
/// # Errors
/// `InvalidJson` carrying the parser message.
pub fn parse_instant(text: &str) -> Result<DateTime, DbError> {
    ChronoDateTime::parse_from_rfc3339(text)
        .map(|dt| DateTime::from_chrono(dt.with_timezone(&Utc)))
        .map_err(|e| DbError::InvalidJson(format!("invalid timestamp {text:?}: {e}")))
}
