//! Job schedule expressions.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::ScheduleParseError;

/// Prefix of one-shot expressions.
pub const DATE_PREFIX: &str = "@date ";

/// Layout of the `@date` literal.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parsed form of a job schedule.
#[derive(Debug, Clone)]
pub enum ScheduleKind {
    /// Six-field (or seven, with year) seconds-first cron expression.
    Recurring(Box<Schedule>),
    /// A single instant.
    OneShot(DateTime<Utc>),
}

/// A job schedule bound to the zone its wall-clock fields are read in.
#[derive(Debug, Clone)]
pub struct JobSchedule {
    source: String,
    kind: ScheduleKind,
    tz: Tz,
}

/// Resolve an IANA zone name ("UTC", "Asia/Shanghai").
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleParseError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleParseError::Timezone(name.to_string()))
}

impl JobSchedule {
    /// Parse a schedule expression. Fails fast on malformed syntax.
    pub fn parse(expr: &str, tz: Tz) -> Result<Self, ScheduleParseError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(ScheduleParseError::Empty);
        }

        let kind = match trimmed.strip_prefix(DATE_PREFIX) {
            Some(literal) => ScheduleKind::OneShot(parse_date(trimmed, literal.trim(), tz)?),
            None => {
                let schedule =
                    Schedule::from_str(trimmed).map_err(|e| ScheduleParseError::Cron {
                        expr: trimmed.to_string(),
                        reason: e.to_string(),
                    })?;
                ScheduleKind::Recurring(Box::new(schedule))
            }
        };

        Ok(Self {
            source: trimmed.to_string(),
            kind,
            tz,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &ScheduleKind {
        &self.kind
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self.kind, ScheduleKind::OneShot(_))
    }

    /// The literal instant of a one-shot schedule.
    pub fn one_shot_at(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            ScheduleKind::OneShot(at) => Some(at),
            ScheduleKind::Recurring(_) => None,
        }
    }

    /// Whether `instant`, truncated to the second, satisfies the schedule.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let instant = instant.trunc_subsecs(0);
        match &self.kind {
            ScheduleKind::OneShot(at) => *at == instant,
            ScheduleKind::Recurring(schedule) => {
                let local = instant.with_timezone(&self.tz);
                let just_before = local - chrono::Duration::seconds(1);
                schedule.after(&just_before).next() == Some(local)
            }
        }
    }

    /// The most recent scheduled instant in `(now - window, now]`.
    ///
    /// For a one-shot schedule this is its literal when the literal lies in
    /// the window; the window is the one-shot's tolerance.
    pub fn latest_due(&self, now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
        let now = now.trunc_subsecs(0);
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
        let start = now - window;
        match &self.kind {
            ScheduleKind::OneShot(at) => (*at > start && *at <= now).then_some(*at),
            ScheduleKind::Recurring(schedule) => schedule
                .after(&start.with_timezone(&self.tz))
                .take_while(|t| t.with_timezone(&Utc) <= now)
                .last()
                .map(|t| t.with_timezone(&Utc)),
        }
    }

    /// The next scheduled instant strictly after `after`, if any.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            ScheduleKind::OneShot(at) => (*at > after).then_some(*at),
            ScheduleKind::Recurring(schedule) => schedule
                .after(&after.with_timezone(&self.tz))
                .next()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

fn parse_date(expr: &str, literal: &str, tz: Tz) -> Result<DateTime<Utc>, ScheduleParseError> {
    let err = |reason: String| ScheduleParseError::Date {
        expr: expr.to_string(),
        reason,
    };
    let naive = NaiveDateTime::parse_from_str(literal, DATE_FORMAT)
        .map_err(|e| err(format!("{e} (expected YYYY-MM-DD HH:MM:SS)")))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| err(format!("{literal} does not exist in {}", tz.name())))?;
    Ok(local.with_timezone(&Utc))
}
