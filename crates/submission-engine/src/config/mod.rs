use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            lifecycle: LifecycleConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tunables for command idempotency, reconciliation workers, and the outbox relay.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub idempotency_ttl_hours: i64,
    pub auto_approve_disabled: bool,
    pub view_lock_disabled: bool,
    pub worker_batch_size: usize,
    pub platform_fee_rate: f64,
    pub outbox_max_attempts: u32,
    pub worker_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_hours: 7 * 24,
            auto_approve_disabled: false,
            view_lock_disabled: false,
            worker_batch_size: 100,
            platform_fee_rate: 0.15,
            outbox_max_attempts: 5,
            worker_interval_secs: 60,
        }
    }
}

impl LifecycleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let platform_fee_rate = parse_var(
            "SUBMISSION_PLATFORM_FEE_RATE",
            defaults.platform_fee_rate,
        )?;
        if !(0.0..1.0).contains(&platform_fee_rate) {
            return Err(ConfigError::InvalidValue {
                key: "SUBMISSION_PLATFORM_FEE_RATE",
                value: platform_fee_rate.to_string(),
            });
        }

        let idempotency_ttl_hours = parse_var(
            "SUBMISSION_IDEMPOTENCY_TTL_HOURS",
            defaults.idempotency_ttl_hours,
        )?;
        if idempotency_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "SUBMISSION_IDEMPOTENCY_TTL_HOURS",
                value: idempotency_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            idempotency_ttl_hours,
            auto_approve_disabled: parse_flag(
                "SUBMISSION_AUTO_APPROVE_DISABLED",
                defaults.auto_approve_disabled,
            )?,
            view_lock_disabled: parse_flag(
                "SUBMISSION_VIEW_LOCK_DISABLED",
                defaults.view_lock_disabled,
            )?,
            worker_batch_size: parse_var(
                "SUBMISSION_WORKER_BATCH_SIZE",
                defaults.worker_batch_size,
            )?,
            platform_fee_rate,
            outbox_max_attempts: parse_var(
                "SUBMISSION_OUTBOX_MAX_ATTEMPTS",
                defaults.outbox_max_attempts,
            )?,
            worker_interval_secs: parse_var(
                "SUBMISSION_WORKER_INTERVAL_SECS",
                defaults.worker_interval_secs,
            )?,
        })
    }

    pub fn idempotency_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.idempotency_ttl_hours)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "SUBMISSION_IDEMPOTENCY_TTL_HOURS",
            "SUBMISSION_AUTO_APPROVE_DISABLED",
            "SUBMISSION_VIEW_LOCK_DISABLED",
            "SUBMISSION_WORKER_BATCH_SIZE",
            "SUBMISSION_PLATFORM_FEE_RATE",
            "SUBMISSION_OUTBOX_MAX_ATTEMPTS",
            "SUBMISSION_WORKER_INTERVAL_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert_eq!(config.lifecycle.idempotency_ttl(), chrono::Duration::days(7));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn lifecycle_flags_and_numbers_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SUBMISSION_AUTO_APPROVE_DISABLED", "true");
        env::set_var("SUBMISSION_WORKER_BATCH_SIZE", "25");
        env::set_var("SUBMISSION_PLATFORM_FEE_RATE", "0.2");
        let config = AppConfig::load().expect("config loads");
        assert!(config.lifecycle.auto_approve_disabled);
        assert!(!config.lifecycle.view_lock_disabled);
        assert_eq!(config.lifecycle.worker_batch_size, 25);
        assert!((config.lifecycle.platform_fee_rate - 0.2).abs() < f64::EPSILON);
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_fee_rate() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SUBMISSION_PLATFORM_FEE_RATE", "1.5");
        match AppConfig::load() {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "SUBMISSION_PLATFORM_FEE_RATE")
            }
            other => panic!("expected invalid fee rate, got {other:?}"),
        }
        reset_env();
    }
}
