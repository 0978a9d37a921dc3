//! Runtime configuration of the controller.

use std::time::Duration;

use chrono_tz::Tz;
use cronscale_core::config::{
    DEFAULT_APPLY_TIMEOUT, DEFAULT_MAX_CONCURRENT_POLICIES, DEFAULT_MISFIRE_GRACE,
    DEFAULT_TICK_INTERVAL,
};
use cronscale_core::{CronscaleConfig, ExcludedOneShot};
use cronscale_schedule::parse_timezone;

use crate::error::{ControllerError, ControllerResult};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often the tick loop evaluates all policies.
    pub tick_interval: Duration,
    /// Trailing window in which a scheduled instant is still due. Bounds the
    /// retry span of a failed firing and the tolerance of `@date` literals.
    pub misfire_grace: Duration,
    /// Upper bound on every read/apply against the object API.
    pub apply_timeout: Duration,
    /// Policies evaluated concurrently within one tick.
    pub max_concurrent_policies: usize,
    /// Zone in which schedules and exclusion days are read.
    pub timezone: Tz,
    pub one_shot_on_excluded_day: ExcludedOneShot,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            misfire_grace: DEFAULT_MISFIRE_GRACE,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
            max_concurrent_policies: DEFAULT_MAX_CONCURRENT_POLICIES,
            timezone: Tz::UTC,
            one_shot_on_excluded_day: ExcludedOneShot::Drop,
        }
    }
}

impl ControllerConfig {
    pub fn from_file_config(config: &CronscaleConfig) -> ControllerResult<Self> {
        let timezone = parse_timezone(&config.timezone())
            .map_err(|e| ControllerError::Config(e.to_string()))?;
        let cfg = Self {
            tick_interval: config.tick_interval(),
            misfire_grace: config.misfire_grace(),
            apply_timeout: config.apply_timeout(),
            max_concurrent_policies: config.max_concurrent_policies(),
            timezone,
            one_shot_on_excluded_day: config.one_shot_on_excluded_day(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ControllerResult<()> {
        if self.tick_interval.is_zero() {
            return Err(ControllerError::Config("tick_interval must be positive".into()));
        }
        // A grace shorter than the tick would let firings slip between ticks.
        if self.misfire_grace < self.tick_interval {
            return Err(ControllerError::Config(format!(
                "misfire_grace ({:?}) must be at least tick_interval ({:?})",
                self.misfire_grace, self.tick_interval
            )));
        }
        if self.max_concurrent_policies == 0 {
            return Err(ControllerError::Config(
                "max_concurrent_policies must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
