//! Timezone-aware opening-hours evaluation.
//!
//! The check instant is converted into the venue's own timezone before it is
//! compared with posted hours. Missing hours data means "always open".

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

use super::types::{BusinessHours, OpeningPeriod};

static HHMM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]?\d|2[0-4]):([0-5]\d)$").expect("HHMM_PATTERN regex should compile")
});

/// A parsed `HH:MM` value. `24:00` is kept distinct from `00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    /// Parse `HH:MM` (`24:00` allowed, nothing past it).
    pub fn parse(value: &str) -> Option<Self> {
        let caps = HHMM_PATTERN.captures(value.trim())?;
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        if hour == 24 && minute != 0 {
            return None;
        }
        Some(Self { hour, minute })
    }

    pub fn is_end_of_day(self) -> bool {
        self.hour == 24
    }

    fn minutes(self) -> u32 {
        self.hour * 60 + self.minute
    }

    /// Local datetime on `date`; `24:00` rolls to midnight of the next day.
    fn on(self, date: NaiveDate) -> NaiveDateTime {
        let midnight = date.and_time(NaiveTime::MIN);
        midnight + Duration::minutes(i64::from(self.minutes()))
    }
}

/// Error for malformed posted hours.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hours value '{value}' (expected HH:MM)")]
pub struct HoursError {
    pub value: String,
}

/// Resolve a venue timezone name, defaulting to UTC.
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    match name {
        None => Tz::UTC,
        Some(raw) => raw.parse::<Tz>().unwrap_or_else(|_| {
            warn!(timezone = raw, "Unknown venue timezone, falling back to UTC");
            Tz::UTC
        }),
    }
}

/// Check every period parses.
pub fn validate(hours: &BusinessHours) -> Result<(), HoursError> {
    for period in &hours.periods {
        parse_period(period)?;
    }
    Ok(())
}

fn parse_period(period: &OpeningPeriod) -> Result<(ClockTime, ClockTime), HoursError> {
    let open = ClockTime::parse(&period.open).ok_or_else(|| HoursError {
        value: period.open.clone(),
    })?;
    let close = ClockTime::parse(&period.close).ok_or_else(|| HoursError {
        value: period.close.clone(),
    })?;
    Ok((open, close))
}

/// Local `[open, close)` window for a period anchored on `date`.
fn window(open: ClockTime, close: ClockTime, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = open.on(date);
    let end = if close.minutes() <= open.minutes() && !close.is_end_of_day() {
        // Past midnight; equal open/close means open around the clock
        close.on(date) + Duration::days(1)
    } else {
        close.on(date)
    };
    (start, end)
}

/// Whether a venue with `hours` in `timezone` is open at `at`.
pub fn is_open_at(
    hours: Option<&BusinessHours>,
    timezone: Option<&str>,
    at: DateTime<Utc>,
) -> Result<bool, HoursError> {
    let hours = match hours {
        Some(h) if !h.periods.is_empty() => h,
        _ => return Ok(true),
    };

    let local = at.with_timezone(&resolve_timezone(timezone)).naive_local();
    let today = local.date();
    let yesterday = today - Duration::days(1);

    for period in &hours.periods {
        let (open, close) = parse_period(period)?;
        // Yesterday's periods can run past midnight into today
        for date in [today, yesterday] {
            if date.weekday() != period.day {
                continue;
            }
            let (start, end) = window(open, close, date);
            if local >= start && local < end {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn hours(periods: Vec<OpeningPeriod>) -> BusinessHours {
        BusinessHours { periods }
    }

    // 2026-03-02 is a Monday
    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(
            ClockTime::parse("09:30"),
            Some(ClockTime {
                hour: 9,
                minute: 30
            })
        );
        assert!(ClockTime::parse("24:00").unwrap().is_end_of_day());
        assert_eq!(ClockTime::parse("24:30"), None);
        assert_eq!(ClockTime::parse("25:00"), None);
        assert_eq!(ClockTime::parse("9am"), None);
    }

    #[test]
    fn test_missing_hours_is_open() {
        assert!(is_open_at(None, None, utc(2, 3, 0)).unwrap());
        assert!(is_open_at(Some(&BusinessHours::default()), None, utc(2, 3, 0)).unwrap());
    }

    #[test]
    fn test_simple_day_window() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "09:00", "17:00")]);
        assert!(is_open_at(Some(&h), None, utc(2, 9, 0)).unwrap());
        assert!(is_open_at(Some(&h), None, utc(2, 16, 59)).unwrap());
        assert!(!is_open_at(Some(&h), None, utc(2, 17, 0)).unwrap());
        // Tuesday
        assert!(!is_open_at(Some(&h), None, utc(3, 10, 0)).unwrap());
    }

    #[test]
    fn test_overnight_window_spans_into_next_day() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Fri, "18:00", "02:00")]);
        // Friday 2026-03-06 23:00 and Saturday 01:30
        assert!(is_open_at(Some(&h), None, utc(6, 23, 0)).unwrap());
        assert!(is_open_at(Some(&h), None, utc(7, 1, 30)).unwrap());
        assert!(!is_open_at(Some(&h), None, utc(7, 2, 0)).unwrap());
        // Friday early morning is not covered by Friday's own window
        assert!(!is_open_at(Some(&h), None, utc(6, 1, 0)).unwrap());
    }

    #[test]
    fn test_24_00_closes_at_midnight() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "12:00", "24:00")]);
        assert!(is_open_at(Some(&h), None, utc(2, 23, 59)).unwrap());
        assert!(!is_open_at(Some(&h), None, utc(3, 0, 0)).unwrap());
    }

    #[test]
    fn test_equal_open_close_is_all_day() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "00:00", "00:00")]);
        assert!(is_open_at(Some(&h), None, utc(2, 0, 0)).unwrap());
        assert!(is_open_at(Some(&h), None, utc(2, 23, 59)).unwrap());
        assert!(!is_open_at(Some(&h), None, utc(3, 0, 0)).unwrap());
    }

    #[test]
    fn test_timezone_conversion() {
        // Tokyo is UTC+9: 01:00 UTC Monday is 10:00 local Monday
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "09:00", "17:00")]);
        assert!(is_open_at(Some(&h), Some("Asia/Tokyo"), utc(2, 1, 0)).unwrap());
        assert!(!is_open_at(Some(&h), None, utc(2, 1, 0)).unwrap());
    }

    #[test]
    fn test_unknown_timezone_defaults_to_utc() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "09:00", "17:00")]);
        assert!(is_open_at(Some(&h), Some("Mars/Olympus"), utc(2, 10, 0)).unwrap());
    }

    #[test]
    fn test_malformed_hours_rejected() {
        let h = hours(vec![OpeningPeriod::new(Weekday::Mon, "9", "17:00")]);
        assert!(validate(&h).is_err());
        assert!(is_open_at(Some(&h), None, utc(2, 10, 0)).is_err());
    }
}
