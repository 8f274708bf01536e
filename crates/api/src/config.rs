//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use common::{CommissionRate, Money, UserId};
use domain::MarketPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid {var}: {value:?} ({reason})")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: PostgreSQL store when set, in-memory otherwise
/// - `COMMISSION_BPS`, `NEED_TTL_SECS`, `OFFER_TTL_SECS`,
///   `MIN_WITHDRAWAL_CENTS`, `CONFLICT_RETRY_ATTEMPTS`, `PLATFORM_USER_ID`:
///   marketplace policy
/// - `SWEEP_INTERVAL_SECS`: expiry sweeper period
/// - `MARKET_SEED`: JSON file seeding the in-memory collaborators
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub commission_bps: u32,
    pub need_ttl_secs: i64,
    pub offer_ttl_secs: i64,
    pub min_withdrawal_cents: i64,
    pub conflict_retry_attempts: u32,
    pub sweep_interval_secs: u64,
    pub platform_user_id: UserId,
    pub market_seed: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let log_format = match var("LOG_FORMAT") {
            None => defaults.log_format,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "pretty" | "text" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => return Err(invalid("LOG_FORMAT", v, "expected pretty or json")),
            },
        };

        let platform_user_id = match var("PLATFORM_USER_ID") {
            None => defaults.platform_user_id,
            Some(v) => v
                .parse::<UserId>()
                .map_err(|e| invalid("PLATFORM_USER_ID", v.clone(), e.to_string()))?,
        };

        let commission_bps = parsed(&var, "COMMISSION_BPS", defaults.commission_bps)?;
        if commission_bps > 10_000 {
            return Err(invalid(
                "COMMISSION_BPS",
                commission_bps.to_string(),
                "must be at most 10000 (100%)",
            ));
        }

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed(&var, "PORT", defaults.port)?,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            commission_bps,
            need_ttl_secs: positive(&var, "NEED_TTL_SECS", defaults.need_ttl_secs)?,
            offer_ttl_secs: positive(&var, "OFFER_TTL_SECS", defaults.offer_ttl_secs)?,
            min_withdrawal_cents: parsed(&var, "MIN_WITHDRAWAL_CENTS", defaults.min_withdrawal_cents)?,
            conflict_retry_attempts: parsed(
                &var,
                "CONFLICT_RETRY_ATTEMPTS",
                defaults.conflict_retry_attempts,
            )?,
            sweep_interval_secs: parsed(&var, "SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?
                .max(1),
            platform_user_id,
            market_seed: var("MARKET_SEED").map(PathBuf::from),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// The rules handed to the engines.
    pub fn policy(&self) -> MarketPolicy {
        MarketPolicy {
            commission_rate: CommissionRate::from_bps(self.commission_bps),
            need_ttl: chrono::Duration::seconds(self.need_ttl_secs),
            offer_ttl: chrono::Duration::seconds(self.offer_ttl_secs),
            min_withdrawal: Money::from_cents(self.min_withdrawal_cents),
            conflict_retry_attempts: self.conflict_retry_attempts,
            platform_user_id: self.platform_user_id,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            commission_bps: 500,
            need_ttl_secs: 1800,
            offer_ttl_secs: 1800,
            min_withdrawal_cents: 10_000,
            conflict_retry_attempts: 5,
            sweep_interval_secs: 30,
            platform_user_id: UserId::from_uuid(uuid::Uuid::nil()),
            market_seed: None,
        }
    }
}

fn invalid(var: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError {
        var,
        value,
        reason: reason.into(),
    }
}

fn parsed<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, v.clone(), e.to_string())),
    }
}

fn positive(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    let value = parsed(var, name, default)?;
    if value <= 0 {
        return Err(invalid(name, value.to_string(), "must be positive"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_policy_matches_market_defaults() {
        let policy = Config::default().policy();
        let market = MarketPolicy::default();
        assert_eq!(policy.commission_rate, market.commission_rate);
        assert_eq!(policy.need_ttl, market.need_ttl);
        assert_eq!(policy.offer_ttl, market.offer_ttl);
        assert_eq!(policy.min_withdrawal, market.min_withdrawal);
        assert_eq!(policy.platform_user_id, market.platform_user_id);
    }

    #[test]
    fn test_overrides() {
        let platform = UserId::new();
        let config = from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/market"),
            ("COMMISSION_BPS", "250"),
            ("NEED_TTL_SECS", "60"),
            ("MIN_WITHDRAWAL_CENTS", "500"),
            ("PLATFORM_USER_ID", &platform.to_string()),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/market"));

        let policy = config.policy();
        assert_eq!(policy.commission_rate.bps(), 250);
        assert_eq!(policy.need_ttl, chrono::Duration::seconds(60));
        assert_eq!(policy.min_withdrawal, Money::from_cents(500));
        assert_eq!(policy.platform_user_id, platform);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = from(&[("PORT", ""), ("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = from(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.var, "PORT");

        let err = from(&[("COMMISSION_BPS", "10001")]).unwrap_err();
        assert_eq!(err.var, "COMMISSION_BPS");

        let err = from(&[("NEED_TTL_SECS", "0")]).unwrap_err();
        assert_eq!(err.var, "NEED_TTL_SECS");

        let err = from(&[("PLATFORM_USER_ID", "not-a-uuid")]).unwrap_err();
        assert_eq!(err.var, "PLATFORM_USER_ID");

        assert!(from(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
