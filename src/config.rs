//! Engine configuration management.
//!
//! Consolidates environment variable reads and provides validated configuration.

use crate::db::DatabaseConfig;
use crate::tournament::ManagerSettings;
use std::str::FromStr;

/// Complete engine configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Complete a tournament automatically once its last session is finalized
    pub auto_complete: bool,
    /// Parallel fields used when a tournament does not configure its own
    pub default_parallel_fields: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables, reading `.env` first
    ///
    /// - `DATABASE_URL` and `DB_*` pool settings, see [`DatabaseConfig::from_env`]
    /// - `TOURNAMENT_AUTO_COMPLETE`: `true`/`false` (default: true)
    /// - `TOURNAMENT_DEFAULT_PARALLEL_FIELDS`: at least 1 (default: 1)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();

        let config = Self {
            database: DatabaseConfig::from_env()?,
            auto_complete: env_or("TOURNAMENT_AUTO_COMPLETE", true)?,
            default_parallel_fields: env_or("TOURNAMENT_DEFAULT_PARALLEL_FIELDS", 1)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for local development and tests
    pub fn development() -> Self {
        Self {
            database: DatabaseConfig::development(),
            auto_complete: true,
            default_parallel_fields: 1,
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_parallel_fields == 0 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_DEFAULT_PARALLEL_FIELDS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }

    /// Settings handed to [`crate::tournament::TournamentManager`]
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            auto_complete: self.auto_complete,
            default_parallel_fields: self.default_parallel_fields,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
///
/// Unlike a silent fallback, a value that is present but malformed is an error.
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("cannot parse {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_is_valid() {
        let config = EngineConfig::development();
        assert!(config.validate().is_ok());
        assert!(config.auto_complete);
        assert_eq!(config.default_parallel_fields, 1);
    }

    #[test]
    fn test_zero_parallel_fields_rejected() {
        let config = EngineConfig {
            default_parallel_fields: 0,
            ..EngineConfig::development()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var, .. }) if var == "TOURNAMENT_DEFAULT_PARALLEL_FIELDS"
        ));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<bool>("X", "false"), Ok(false));
        assert_eq!(parse_value::<u32>("X", " 4 "), Ok(4));
        assert!(parse_value::<u32>("X", "four").is_err());
    }

    #[test]
    fn test_manager_settings_follow_config() {
        let config = EngineConfig {
            auto_complete: false,
            default_parallel_fields: 3,
            ..EngineConfig::development()
        };
        let settings = config.manager_settings();
        assert!(!settings.auto_complete);
        assert_eq!(settings.default_parallel_fields, 3);
    }
}
