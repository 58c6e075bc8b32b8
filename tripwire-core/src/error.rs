//! Configuration errors raised at attach time.

use std::fmt;

use serde::Serialize;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The configuration option an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigOption {
    Test,
    Pass,
    Throttle,
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigOption::Test => "test",
            ConfigOption::Pass => "pass",
            ConfigOption::Throttle => "throttle",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A required callback was not supplied
    #[error("tripwire {option} option must be a function")]
    Missing { option: ConfigOption },

    /// The throttle value is not a bool or a non-negative number of milliseconds
    #[error("tripwire throttle option is invalid: {0}")]
    InvalidThrottle(String),
}

impl ConfigError {
    /// The option that failed validation.
    pub fn option(&self) -> ConfigOption {
        match self {
            ConfigError::Missing { option } => *option,
            ConfigError::InvalidThrottle(_) => ConfigOption::Throttle,
        }
    }
}
