//! Server configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use admissions_decision::config::{EngineConfig, RetryPolicy};

use crate::error::AppError;

/// Everything the server needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Upper bound of the connection pool.
    pub database_max_connections: u32,
    /// Engine tuning.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is unset or a variable
    /// holds an unparsable value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000)?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let defaults = EngineConfig::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "ADMISSIONS_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            base_backoff: millis_or(&lookup, "ADMISSIONS_BACKOFF_MS", defaults.retry.base_backoff)?,
        };
        if retry.max_attempts == 0 {
            return Err(AppError::Config(
                "ADMISSIONS_MAX_ATTEMPTS must be at least 1".to_owned(),
            ));
        }
        let engine = EngineConfig {
            retry,
            transition_timeout: millis_or(
                &lookup,
                "ADMISSIONS_TRANSITION_TIMEOUT_MS",
                defaults.transition_timeout,
            )?,
            publish_timeout: millis_or(
                &lookup,
                "ADMISSIONS_PUBLISH_TIMEOUT_MS",
                defaults.publish_timeout,
            )?,
            max_bulk_size: parse_or(&lookup, "ADMISSIONS_MAX_BULK_SIZE", defaults.max_bulk_size)?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            database_max_connections,
            engine,
        })
    }

    /// `HOST:PORT` as a bind address string.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/admissions")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://db/admissions");
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_engine_settings_are_read_from_environment() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/admissions"),
            ("PORT", "8080"),
            ("ADMISSIONS_MAX_ATTEMPTS", "5"),
            ("ADMISSIONS_BACKOFF_MS", "10"),
            ("ADMISSIONS_TRANSITION_TIMEOUT_MS", "1500"),
            ("ADMISSIONS_PUBLISH_TIMEOUT_MS", "250"),
            ("ADMISSIONS_MAX_BULK_SIZE", "50"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.engine.retry.max_attempts, 5);
        assert_eq!(config.engine.retry.base_backoff, Duration::from_millis(10));
        assert_eq!(config.engine.transition_timeout, Duration::from_millis(1500));
        assert_eq!(config.engine.publish_timeout, Duration::from_millis(250));
        assert_eq!(config.engine.max_bulk_size, 50);
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = ServerConfig::from_lookup(lookup_from(&[]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_unparsable_port_is_a_config_error() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/admissions"),
            ("PORT", "eighty"),
        ]));

        let Err(AppError::Config(message)) = result else {
            panic!("expected a config error");
        };
        assert!(message.starts_with("PORT"));
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/admissions"),
            ("ADMISSIONS_MAX_ATTEMPTS", "0"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
