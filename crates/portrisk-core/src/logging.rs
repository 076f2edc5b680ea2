//! Structured logging setup.
//!
//! Engines emit `tracing` events; this module owns subscriber installation so
//! binaries and tests configure output in one place. JSON output is for log
//! aggregation in production, compact text for development.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = RiskError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(RiskError::invalid_parameter(
                "log_level",
                format!("unknown level `{other}`"),
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level to emit.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
        }
    }
}

impl LogConfig {
    /// Development configuration: debug level, text output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            json: false,
        }
    }

    /// Production configuration: info level, JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            json: true,
        }
    }

    /// Install the global subscriber.
    ///
    /// `RUST_LOG` overrides the configured level when set. Fails if a global
    /// subscriber is already installed.
    pub fn init(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let result = if self.json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .try_init()
        };

        result.map_err(|e| RiskError::invalid_parameter("logging", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_roundtrip() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let parsed: LogLevel = level.to_string().parse().expect("roundtrip");
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn test_warning_alias() {
        let parsed: LogLevel = "warning".parse().expect("alias accepted");
        assert_eq!(parsed, LogLevel::Warn);
    }

    #[test]
    fn test_unknown_level_rejected() {
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
