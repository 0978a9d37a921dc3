pub mod config;
pub mod duration;

pub use config::{
    ApiConfig, ControllerFileConfig, CronscaleConfig, ExcludedOneShot, StateConfig,
};
pub use duration::{DurationError, parse_duration};
