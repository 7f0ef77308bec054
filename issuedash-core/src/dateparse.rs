//! Date-arithmetic expression parser
//!
//! Parses a small relative/absolute date grammar into a UTC timestamp:
//! an optional anchor (`2024-01-15T00:00:00Z`, `2024-01-15`, `12:30:00`,
//! or "now" when absent) followed by zero or more adjustments like
//! `+ 7 days`, `- 1 month` or `+ 01:30:00`. Adjustments apply strictly
//! left to right, which matters for month arithmetic: shifting the
//! calendar month keeps the day number and rolls any overflow into the
//! following month, so `2023-01-31 + 1 month` is `2023-03-03`, not
//! `2023-02-28`. That rollover is the defined behavior, intuitive or not.
//!
//! The `date`/`time`/`datetime` helpers built on the parser are the fixed
//! helper set exposed to template expressions.

use crate::error::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Timelike};
use chrono::{DateTime, Utc};

/// Parse a date expression against the current time.
pub fn parse(input: &str) -> Result<DateTime<Utc>> {
    parse_at(input, Utc::now())
}

/// Parse a date expression against an explicit "now" (used by tests to
/// pin the clock).
pub fn parse_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let mut rest = input.trim_start();
    let mut implicit_sign = false;

    let mut value = if let Some((dt, r)) = match_datetime(rest) {
        rest = r;
        dt
    } else if let Some((date, r)) = match_date(rest) {
        rest = r;
        utc_datetime(date.and_time(NaiveTime::MIN))
    } else if let Some((tod, r)) = match_time(rest) {
        rest = r;
        utc_datetime(now.date_naive().and_time(tod))
    } else {
        // no anchor: start from now; the first adjustment may omit its sign
        implicit_sign = true;
        now
    };

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let sign: i64 = if let Some(r) = rest.strip_prefix('+') {
            rest = r.trim_start();
            1
        } else if let Some(r) = rest.strip_prefix('-') {
            rest = r.trim_start();
            -1
        } else if implicit_sign {
            1
        } else {
            return Err(Error::Date(format!("operator expected, got '{rest}'")));
        };
        implicit_sign = false;

        if let Some((amount, unit, r)) = match_adjustment(rest) {
            rest = r;
            value = apply(value, sign * amount, unit)?;
        } else if let Some((tod, r)) = match_time(rest) {
            rest = r;
            value = apply(value, sign * i64::from(tod.hour()), Unit::Hour)?;
            value = apply(value, sign * i64::from(tod.minute()), Unit::Minute)?;
            value = apply(value, sign * i64::from(tod.second()), Unit::Second)?;
        } else {
            return Err(Error::Date(format!("date adjustment expected, got '{rest}'")));
        }
    }

    Ok(value)
}

/// `date(expr?)` helper: format the parsed expression as `YYYY-MM-DD`.
pub fn date(input: Option<&str>) -> Result<String> {
    Ok(parse(input.unwrap_or_default())?.format("%Y-%m-%d").to_string())
}

/// `time(expr?)` helper: format the parsed expression as `HH:MM:SS`.
pub fn time(input: Option<&str>) -> Result<String> {
    Ok(parse(input.unwrap_or_default())?.format("%H:%M:%S").to_string())
}

/// `datetime(expr?)` helper: format the parsed expression as ISO-8601.
pub fn datetime(input: Option<&str>) -> Result<String> {
    Ok(parse(input.unwrap_or_default())?.to_rfc3339_opts(SecondsFormat::Secs, false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

fn utc_datetime(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}

/// Match a leading `YYYY-MM-DDTHH:MM:SSZ` timestamp.
fn match_datetime(input: &str) -> Option<(DateTime<Utc>, &str)> {
    let head = input.get(..20)?;
    if !head.ends_with('Z') {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&head[..19], "%Y-%m-%dT%H:%M:%S").ok()?;
    Some((utc_datetime(naive), &input[20..]))
}

/// Match a leading `YYYY-MM-DD` date.
fn match_date(input: &str) -> Option<(NaiveDate, &str)> {
    let head = input.get(..10)?;
    let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()?;
    Some((date, &input[10..]))
}

/// Match a leading `HH:MM:SS` time of day.
fn match_time(input: &str) -> Option<(NaiveTime, &str)> {
    let head = input.get(..8)?;
    let tod = NaiveTime::parse_from_str(head, "%H:%M:%S").ok()?;
    Some((tod, &input[8..]))
}

/// Match `<digits> <unit>` with an optional plural `s` on the unit.
fn match_adjustment(input: &str) -> Option<(i64, Unit, &str)> {
    let digits = input.len() - input.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let amount: i64 = input[..digits].parse().ok()?;

    let rest = input[digits..].trim_start();
    let word_len = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
    let word = rest[..word_len].strip_suffix('s').unwrap_or(&rest[..word_len]);

    let unit = match word {
        "year" => Unit::Year,
        "month" => Unit::Month,
        "day" => Unit::Day,
        "hour" => Unit::Hour,
        "minute" => Unit::Minute,
        "second" => Unit::Second,
        _ => return None,
    };
    Some((amount, unit, &rest[word_len..]))
}

fn apply(value: DateTime<Utc>, amount: i64, unit: Unit) -> Result<DateTime<Utc>> {
    let out_of_range = || Error::Date(format!("date adjustment out of range: {amount}"));
    let delta = match unit {
        Unit::Year => {
            let months = amount.checked_mul(12).ok_or_else(out_of_range)?;
            return shift_months(value, months);
        }
        Unit::Month => return shift_months(value, amount),
        Unit::Day => Duration::try_days(amount),
        Unit::Hour => Duration::try_hours(amount),
        Unit::Minute => Duration::try_minutes(amount),
        Unit::Second => Duration::try_seconds(amount),
    };
    let delta = delta.ok_or_else(out_of_range)?;
    value.checked_add_signed(delta).ok_or_else(out_of_range)
}

/// Shift the calendar month, keeping the day number and rolling any
/// overflow into the following month (`Jan 31 + 1 month` -> `Mar 3`).
fn shift_months(value: DateTime<Utc>, delta: i64) -> Result<DateTime<Utc>> {
    let months = (i64::from(value.year()) * 12 + i64::from(value.month0()))
        .checked_add(delta)
        .ok_or_else(|| Error::Date(format!("month adjustment out of range: {delta}")))?;
    let mut year = i32::try_from(months.div_euclid(12))
        .map_err(|_| Error::Date(format!("month adjustment out of range: {delta}")))?;
    let mut month = u32::try_from(months.rem_euclid(12)).unwrap_or(0) + 1;

    let mut day = value.day();
    let dim = days_in_month(year, month);
    if day > dim {
        day -= dim;
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }

    Utc.with_ymd_and_hms(year, month, day, value.hour(), value.minute(), value.second())
        .single()
        .ok_or_else(|| Error::Date(format!("month adjustment out of range: {delta}")))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        utc_datetime(
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").expect("valid test timestamp"),
        )
    }

    #[test]
    fn test_absolute_datetime_anchor() {
        let parsed = parse("2023-06-15T10:30:00Z").expect("parse");
        assert_eq!(parsed, ts("2023-06-15T10:30:00"));
    }

    #[test]
    fn test_date_anchor_defaults_to_midnight() {
        let parsed = parse("2023-06-15").expect("parse");
        assert_eq!(parsed, ts("2023-06-15T00:00:00"));
    }

    #[test]
    fn test_time_anchor_applies_to_now() {
        let now = ts("2023-06-15T10:30:00");
        let parsed = parse_at("08:15:30", now).expect("parse");
        assert_eq!(parsed, ts("2023-06-15T08:15:30"));
    }

    #[test]
    fn test_no_anchor_first_adjustment_needs_no_sign() {
        let now = ts("2023-06-15T00:00:00");
        assert_eq!(parse_at("7 days", now).expect("parse"), ts("2023-06-22T00:00:00"));
        assert_eq!(parse_at("- 7 days", now).expect("parse"), ts("2023-06-08T00:00:00"));
    }

    #[test]
    fn test_second_adjustment_requires_sign() {
        let now = ts("2023-06-15T00:00:00");
        assert!(parse_at("7 days 1 hour", now).is_err());
    }

    #[test]
    fn test_anchored_adjustment_requires_sign() {
        assert!(parse("2023-06-15 7 days").is_err());
    }

    #[test]
    fn test_month_overflow_rolls_forward() {
        // Jan 31 + 1 month lands on Feb 31, which normalizes to Mar 3.
        // This is the defined behavior, not a clamp to the end of February.
        let parsed = parse("2023-01-31 + 1 month").expect("parse");
        assert_eq!(parsed, ts("2023-03-03T00:00:00"));
    }

    #[test]
    fn test_month_overflow_in_leap_year() {
        let parsed = parse("2024-01-31 + 1 month").expect("parse");
        assert_eq!(parsed, ts("2024-03-02T00:00:00"));
    }

    #[test]
    fn test_leap_day_plus_one_year() {
        let parsed = parse("2024-02-29 + 1 year").expect("parse");
        assert_eq!(parsed, ts("2025-03-01T00:00:00"));
    }

    #[test]
    fn test_adjustments_are_not_commutative() {
        let month_then_day = parse("2023-01-31 + 1 month + 1 day").expect("parse");
        let day_then_month = parse("2023-01-31 + 1 day + 1 month").expect("parse");
        assert_eq!(month_then_day, ts("2023-03-04T00:00:00"));
        assert_eq!(day_then_month, ts("2023-03-01T00:00:00"));
    }

    #[test]
    fn test_hms_adjustment_applies_three_units() {
        let parsed = parse("2023-06-15 + 01:02:03").expect("parse");
        assert_eq!(parsed, ts("2023-06-15T01:02:03"));

        let parsed = parse("2023-06-15T12:00:00Z - 01:30:00").expect("parse");
        assert_eq!(parsed, ts("2023-06-15T10:30:00"));
    }

    #[test]
    fn test_plural_and_singular_units() {
        let now = ts("2023-06-15T00:00:00");
        assert_eq!(parse_at("1 day", now).expect("parse"), ts("2023-06-16T00:00:00"));
        assert_eq!(parse_at("2 hours", now).expect("parse"), ts("2023-06-15T02:00:00"));
        assert_eq!(parse_at("1 hours", now).expect("parse"), ts("2023-06-15T01:00:00"));
    }

    #[test]
    fn test_trailing_garbage_is_an_error() {
        assert!(parse("2023-06-15 + 1 fortnight").is_err());
        assert!(parse("2023-06-15 + banana").is_err());
        assert!(parse("next tuesday").is_err());
    }

    #[test]
    fn test_out_of_range_adjustments_are_errors() {
        assert!(parse("2023-06-15 + 9223372036854775807 years").is_err());
        assert!(parse("2023-06-15 + 100000000000 days").is_err());
        assert!(parse("2023-06-15 + 200000000000000 days").is_err());
        assert!(parse("2023-06-15 - 9223372036854775807 months").is_err());
        assert!(parse("2023-06-15 + 9223372036854775807 seconds").is_err());
    }

    #[test]
    fn test_empty_input_is_now() {
        let before = Utc::now();
        let parsed = parse("").expect("parse");
        assert!(parsed >= before && parsed <= Utc::now());
    }

    #[test]
    fn test_helper_formats() {
        assert_eq!(date(Some("2023-01-31 + 1 month")).expect("date"), "2023-03-03");
        assert_eq!(time(Some("2023-06-15T10:30:05Z")).expect("time"), "10:30:05");
        assert_eq!(
            datetime(Some("2023-06-15T10:30:05Z")).expect("datetime"),
            "2023-06-15T10:30:05+00:00"
        );
    }
}
