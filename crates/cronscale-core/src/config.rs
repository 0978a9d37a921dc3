//! cronscale.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::parse_duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronscaleConfig {
    pub controller: Option<ControllerFileConfig>,
    pub api: Option<ApiConfig>,
    pub state: Option<StateConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerFileConfig {
    pub tick_interval: Option<String>,
    pub misfire_grace: Option<String>,
    pub apply_timeout: Option<String>,
    pub max_concurrent_policies: Option<usize>,
    pub timezone: Option<String>,
    pub one_shot_on_excluded_day: Option<ExcludedOneShot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    pub data_dir: Option<PathBuf>,
}

/// What happens to an `@date` job whose instant falls on an excluded day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludedOneShot {
    /// The literal stops matching once its window has passed; it never fires.
    #[default]
    Drop,
    /// Fire at the first later evaluation that is not on an excluded day.
    Defer,
}

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MISFIRE_GRACE: Duration = Duration::from_secs(60);
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_POLICIES: usize = 16;
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_API_PORT: u16 = 8443;
pub const DEFAULT_DATA_DIR: &str = "/var/lib/cronscale";

impl CronscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: CronscaleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject malformed durations up front instead of at first use.
    pub fn validate(&self) -> anyhow::Result<()> {
        let c = self.controller();
        for (field, value) in [
            ("tick_interval", &c.tick_interval),
            ("misfire_grace", &c.misfire_grace),
            ("apply_timeout", &c.apply_timeout),
        ] {
            if let Some(v) = value {
                parse_duration(v).map_err(|e| anyhow::anyhow!("controller.{field}: {e}"))?;
            }
        }
        if c.max_concurrent_policies == Some(0) {
            anyhow::bail!("controller.max_concurrent_policies must be at least 1");
        }
        Ok(())
    }

    pub fn controller(&self) -> ControllerFileConfig {
        self.controller.clone().unwrap_or_default()
    }

    pub fn tick_interval(&self) -> Duration {
        self.duration_or(|c| c.tick_interval.as_deref(), DEFAULT_TICK_INTERVAL)
    }

    pub fn misfire_grace(&self) -> Duration {
        self.duration_or(|c| c.misfire_grace.as_deref(), DEFAULT_MISFIRE_GRACE)
    }

    pub fn apply_timeout(&self) -> Duration {
        self.duration_or(|c| c.apply_timeout.as_deref(), DEFAULT_APPLY_TIMEOUT)
    }

    pub fn max_concurrent_policies(&self) -> usize {
        self.controller
            .as_ref()
            .and_then(|c| c.max_concurrent_policies)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_POLICIES)
    }

    pub fn timezone(&self) -> String {
        self.controller
            .as_ref()
            .and_then(|c| c.timezone.clone())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
    }

    pub fn one_shot_on_excluded_day(&self) -> ExcludedOneShot {
        self.controller
            .as_ref()
            .and_then(|c| c.one_shot_on_excluded_day)
            .unwrap_or_default()
    }

    pub fn api_port(&self) -> u16 {
        self.api.as_ref().and_then(|a| a.port).unwrap_or(DEFAULT_API_PORT)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.state
            .as_ref()
            .and_then(|s| s.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    fn duration_or(
        &self,
        field: impl Fn(&ControllerFileConfig) -> Option<&str>,
        default: Duration,
    ) -> Duration {
        // Values were checked by `validate()`; a bad value falls back to the default.
        self.controller
            .as_ref()
            .and_then(|c| field(c))
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(default)
    }

    /// Scaffold a config with every default written out.
    pub fn scaffold() -> Self {
        CronscaleConfig {
            controller: Some(ControllerFileConfig {
                tick_interval: Some("1s".to_string()),
                misfire_grace: Some("60s".to_string()),
                apply_timeout: Some("10s".to_string()),
                max_concurrent_policies: Some(DEFAULT_MAX_CONCURRENT_POLICIES),
                timezone: Some(DEFAULT_TIMEZONE.to_string()),
                one_shot_on_excluded_day: Some(ExcludedOneShot::Drop),
            }),
            api: Some(ApiConfig {
                port: Some(DEFAULT_API_PORT),
            }),
            state: Some(StateConfig {
                data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            }),
        }
    }
}
