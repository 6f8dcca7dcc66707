//! Structured logging through `tracing`.
//!
//! The filter is taken from the `DEFAULTER_LOG` environment variable when set,
//! otherwise from the configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{DefaulterError, Result};

pub const LOG_ENV: &str = "DEFAULTER_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// trace, debug, info, warn, error or off
    #[serde(default = "default_level")]
    pub level: String,
    /// text or json
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_level(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LoggingSettings {
    pub fn log_format(&self) -> Result<LogFormat> {
        match self.format.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(DefaulterError::Config(format!(
                "Invalid log format '{}', expected text or json",
                other
            ))),
        }
    }
}

/// Installs the global subscriber. Calling it again once a subscriber is in place
/// leaves the existing one alone.
pub fn init_logging(settings: Option<&LoggingSettings>) -> Result<()> {
    let defaults = LoggingSettings::default();
    let settings = settings.unwrap_or(&defaults);
    let format = settings.log_format()?;
    let filter = if settings.enabled {
        build_env_filter(settings)?
    } else {
        EnvFilter::new("off")
    };
    let subscriber = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("a global subscriber was already installed");
    }
    Ok(())
}

fn build_env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level)
        .map_err(|e| DefaulterError::Config(format!("Invalid log level '{}': {}", settings.level, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = LoggingSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.level, "info");
        assert_eq!(settings.log_format().unwrap(), LogFormat::Text);
    }

    #[test]
    fn format_is_validated() {
        let settings = LoggingSettings {
            format: "JSON".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.log_format().unwrap(), LogFormat::Json);
        let settings = LoggingSettings {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.log_format(), Err(DefaulterError::Config(_))));
        assert!(init_logging(Some(&settings)).is_err());
    }

    #[test]
    fn init_twice_is_harmless() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert!(init_logging(Some(&settings)).is_ok());
        assert!(init_logging(None).is_ok());
    }
}
