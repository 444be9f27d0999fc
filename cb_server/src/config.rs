//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use cabin_booking::db::DatabaseConfig;
use cabin_booking::locker::LockerConfig;
use cabin_booking::reclaimer::ReclaimerConfig;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address; metrics are disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Hold lifetime and lock policy
    pub locker: LockerConfig,
    /// Hold reclaimer schedule
    pub reclaimer: ReclaimerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080))),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let mut database = DatabaseConfig::from_env().unwrap_or_default();
        if let Some(database_url) = database_url_override {
            database.database_url = database_url;
        }

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            locker: LockerConfig::from_env(),
            reclaimer: ReclaimerConfig::from_env(),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Must not exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        if Some(self.bind) == self.metrics_bind {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        // A sweep slower than the hold lifetime lets expired holds pile up for a full TTL
        let interval = chrono::Duration::from_std(self.reclaimer.interval).unwrap_or_default();
        if interval > self.locker.hold_ttl {
            return Err(ConfigError::Invalid {
                var: "HOLD_SWEEP_INTERVAL_SECS".to_string(),
                reason: format!(
                    "Must not exceed the hold lifetime ({} minutes)",
                    self.locker.hold_ttl.num_minutes()
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional socket address variable
fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: Some("127.0.0.1:9090".parse().unwrap()),
            database: DatabaseConfig::development(),
            locker: LockerConfig::default(),
            reclaimer: ReclaimerConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = config();
        config.database.min_connections = config.database.max_connections + 1;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_config_validation_metrics_address() {
        let mut config = config();
        config.metrics_bind = Some(config.bind);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var, .. }) if var == "METRICS_BIND"
        ));
    }

    #[test]
    fn test_config_validation_sweep_slower_than_ttl() {
        let mut config = config();
        config.reclaimer.interval = Duration::from_secs(3600);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("HOLD_SWEEP_INTERVAL_SECS"));
    }
}
