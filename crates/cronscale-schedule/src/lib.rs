//! cronscale-schedule: parsing and evaluation of job schedules.
//!
//! Three expression forms:
//!
//! ```text
//! */10 * * * * *            recurring, six fields: sec min hour dom month dow
//! @date 2026-10-15 08:00:00  one-shot, local time in the controller zone
//! * * * 15 10 *              exclusion: only dom + month are significant
//! ```
//!
//! Expressions are parsed once into structured schedules. Evaluation is
//! pure: `matches` checks a single instant, `latest_due` finds the most
//! recent scheduled instant inside a trailing window so that a coarse tick
//! loop neither misses a firing nor sees it twice.

pub mod error;
pub mod exclusion;
pub mod expression;

pub use error::ScheduleParseError;
pub use exclusion::{ExclusionPattern, ExclusionSet};
pub use expression::{JobSchedule, ScheduleKind, parse_timezone};
