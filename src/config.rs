use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// Unset runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_punch_per_min: u32,
    pub rate_protected_per_min: u32,

    /// Deployment offset used for local dates and shift wall-clock times.
    pub tz_offset: FixedOffset,
    pub default_geofence_radius_m: f64,
    pub punch_timeout_ms: u64,
    /// Oldest client timestamp an employee may punch with.
    pub punch_max_age_minutes: i64,

    pub sweep_enabled: bool,
    pub sweep_concurrency: usize,
    pub sweep_overrides_manual: bool,

    pub notify_webhook_url: Option<String>,

    pub log_dir: String,
    pub log_level: String,
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key}={value:?} is invalid: {e}")),
        None => Ok(default),
    }
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(key, env::var(key).ok(), default)
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| anyhow!("TZ_OFFSET_MINUTES={minutes} is out of range"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080".to_string())?,
            database_url: optional("DATABASE_URL"),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            api_prefix: var_or("API_PREFIX", "/api".to_string())?,

            rate_punch_per_min: var_or("RATE_PUNCH_PER_MIN", 120)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            tz_offset: offset_from_minutes(var_or("TZ_OFFSET_MINUTES", 0)?)?,
            default_geofence_radius_m: var_or("DEFAULT_GEOFENCE_RADIUS_M", 100.0)?,
            punch_timeout_ms: var_or("PUNCH_TIMEOUT_MS", 800)?,
            punch_max_age_minutes: var_or("PUNCH_MAX_AGE_MINUTES", 15)?,

            sweep_enabled: var_or("SWEEP_ENABLED", true)?,
            sweep_concurrency: var_or("SWEEP_CONCURRENCY", 8)?,
            sweep_overrides_manual: var_or("SWEEP_OVERRIDES_MANUAL", false)?,

            notify_webhook_url: optional("NOTIFY_WEBHOOK_URL"),

            log_dir: var_or("LOG_DIR", "logs".to_string())?,
            log_level: var_or("LOG_LEVEL", "debug".to_string())?,
        })
    }

    pub fn punch_timeout(&self) -> Duration {
        Duration::from_millis(self.punch_timeout_ms)
    }

    pub fn punch_max_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.punch_max_age_minutes.max(0))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            database_url: None,
            jwt_secret: String::new(),
            api_prefix: "/api".to_string(),
            rate_punch_per_min: 120,
            rate_protected_per_min: 1000,
            tz_offset: Utc.fix(),
            default_geofence_radius_m: 100.0,
            punch_timeout_ms: 800,
            punch_max_age_minutes: 15,
            sweep_enabled: true,
            sweep_concurrency: 8,
            sweep_overrides_manual: false,
            notify_webhook_url: None,
            log_dir: "logs".to_string(),
            log_level: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_fall_back_to_default() {
        assert_eq!(parse_or("RATE_PUNCH_PER_MIN", None, 120u32).unwrap(), 120);
        assert_eq!(parse_or("RATE_PUNCH_PER_MIN", Some("  ".into()), 120u32).unwrap(), 120);
        assert_eq!(parse_or("RATE_PUNCH_PER_MIN", Some("30".into()), 120u32).unwrap(), 30);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = parse_or("SWEEP_ENABLED", Some("sometimes".into()), true).unwrap_err();
        assert!(err.to_string().contains("SWEEP_ENABLED"));
    }

    #[test]
    fn offsets_are_bounded() {
        assert_eq!(offset_from_minutes(360).unwrap().local_minus_utc(), 6 * 3600);
        assert_eq!(offset_from_minutes(-300).unwrap().local_minus_utc(), -5 * 3600);
        assert!(offset_from_minutes(24 * 60).is_err());
    }
}
