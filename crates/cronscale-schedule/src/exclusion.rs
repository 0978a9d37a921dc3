//! Whole-day exclusion patterns.
//!
//! An exclusion is written as a six-field cron expression, but only its
//! day-of-month and month fields count: `* * * 15 10 *` and
//! `0 30 9 15 10 *` both exclude every instant of October 15th.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::ScheduleParseError;

const DAY_OF_MONTH: usize = 3;
const MONTH: usize = 4;

#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    source: String,
    /// `0 0 0 {dom} {month} *`, evaluated at midnight of a candidate day.
    day: Box<Schedule>,
}

impl ExclusionPattern {
    pub fn parse(expr: &str) -> Result<Self, ScheduleParseError> {
        let trimmed = expr.trim();
        let err = |reason: String| ScheduleParseError::Exclusion {
            expr: trimmed.to_string(),
            reason,
        };

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if !(6..=7).contains(&fields.len()) {
            return Err(err(format!("expected 6 fields, found {}", fields.len())));
        }
        // The full expression must still be valid cron even though most of
        // it is ignored.
        Schedule::from_str(trimmed).map_err(|e| err(e.to_string()))?;

        let day_expr = format!("0 0 0 {} {} *", fields[DAY_OF_MONTH], fields[MONTH]);
        let day = Schedule::from_str(&day_expr).map_err(|e| err(e.to_string()))?;

        Ok(Self {
            source: trimmed.to_string(),
            day: Box::new(day),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the calendar day `date` is excluded.
    pub fn excludes_date(&self, date: NaiveDate) -> bool {
        // Only month and day matter, so the date is anchored at UTC midnight
        // regardless of the zone it was read in.
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            return false;
        };
        let midnight = Utc.from_utc_datetime(&midnight);
        let just_before = midnight - chrono::Duration::seconds(1);
        self.day.after(&just_before).next() == Some(midnight)
    }
}

/// The exclusion list of one policy.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<ExclusionPattern>,
}

impl ExclusionSet {
    /// Parse every entry; the first malformed one fails the whole set.
    pub fn parse<S: AsRef<str>>(exprs: &[S]) -> Result<Self, ScheduleParseError> {
        let patterns = exprs
            .iter()
            .map(|e| ExclusionPattern::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the local calendar day of `instant` in `tz` is excluded.
    pub fn excludes(&self, instant: DateTime<Utc>, tz: Tz) -> bool {
        let date = instant.with_timezone(&tz).date_naive();
        self.excludes_date(date)
    }

    pub fn excludes_date(&self, date: NaiveDate) -> bool {
        self.patterns.iter().any(|p| p.excludes_date(date))
    }

    /// The pattern that excludes `date`, if any.
    pub fn matching(&self, date: NaiveDate) -> Option<&ExclusionPattern> {
        self.patterns.iter().find(|p| p.excludes_date(date))
    }
}
