//! Human-friendly duration strings ("500ms", "30s", "5m", "1h").

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration: {0}")]
    Invalid(String),
}

/// Parse a duration string like "30s", "5m" or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let invalid = || DurationError::Invalid(s.to_string());

    // "ms" must be checked before "s".
    if let Some(ms) = s.strip_suffix("ms") {
        let n = ms.trim().parse::<u64>().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(n));
    }

    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let n = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    let secs = match unit {
        's' => Some(n),
        'm' => n.checked_mul(60),
        'h' => n.checked_mul(3600),
        _ => return Err(invalid()),
    }
    .ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}
