use std::{fmt::Display, str::FromStr, time::Duration};

use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::db::RetryPolicy;

const DEV_JWT_SECRET: &str = "dev-jwt-secret-change-me-in-secrets-toml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Pool and retry tuning for the Postgres connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            retry_attempts: crate::db::executor::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: crate::db::executor::DEFAULT_BASE_DELAY,
        }
    }
}

impl DatabaseSettings {
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }
}

/// Runtime settings, read from `Secrets.toml` at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Starting `powers` balance for newly created profiles
    pub initial_powers: i32,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_powers: 100,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_hours: 24 * 7,
            database: DatabaseSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secrets.get(key))
    }

    /// Build settings from any key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let db = defaults.database;

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                defaults.jwt_secret
            }
        };

        Ok(Self {
            initial_powers: parse_at_least(&lookup, "INITIAL_POWERS", defaults.initial_powers, 0)?,
            jwt_secret,
            jwt_expiry_hours: parse_at_least(&lookup, "JWT_EXPIRY_HOURS", defaults.jwt_expiry_hours, 1)?,
            database: DatabaseSettings {
                max_connections: parse_at_least(&lookup, "DB_MAX_CONNECTIONS", db.max_connections, 1)?,
                connect_timeout: Duration::from_secs(parse_at_least(
                    &lookup,
                    "DB_CONNECT_TIMEOUT_SECS",
                    db.connect_timeout.as_secs(),
                    1,
                )?),
                idle_timeout: Duration::from_secs(parse_at_least(
                    &lookup,
                    "DB_IDLE_TIMEOUT_SECS",
                    db.idle_timeout.as_secs(),
                    1,
                )?),
                retry_attempts: parse_at_least(&lookup, "DB_RETRY_ATTEMPTS", db.retry_attempts, 1)?,
                retry_base_delay: Duration::from_millis(parse_at_least(
                    &lookup,
                    "DB_RETRY_BASE_MS",
                    db.retry_base_delay.as_millis() as u64,
                    0,
                )?),
            },
        })
    }
}

fn parse_at_least<F, T>(lookup: &F, key: &'static str, default: T, min: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    let value = raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value < min {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: format!("must be at least {min}"),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        assert_eq!(settings_from(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings_from(&[
            ("INITIAL_POWERS", "250"),
            ("JWT_SECRET", "s3cret"),
            ("DB_RETRY_ATTEMPTS", "5"),
            ("DB_RETRY_BASE_MS", "200"),
        ])
        .unwrap();

        assert_eq!(settings.initial_powers, 250);
        assert_eq!(settings.jwt_secret, "s3cret");
        let policy = settings.database.retry_policy();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
    }

    #[test]
    fn negative_wallet_balance_is_rejected() {
        let err = settings_from(&[("INITIAL_POWERS", "-10")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "INITIAL_POWERS", .. }));
    }

    #[test]
    fn garbage_is_rejected_not_defaulted() {
        let err = settings_from(&[("DB_RETRY_ATTEMPTS", "three")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_RETRY_ATTEMPTS", .. }));

        let err = settings_from(&[("DB_RETRY_ATTEMPTS", "0")]).unwrap_err();
        assert!(err.to_string().contains("must be at least 1"));
    }
}
