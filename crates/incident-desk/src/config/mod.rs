use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::incidents::scoring::{PerformanceWeights, ScoringConfig, ScoringWeights};

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
    pub ai: AiConfig,
    pub report: ReportConfig,
    pub persistence: RetryPolicy,
    pub scoring: ScoringConfig,
    pub validation: ValidationConfig,
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

        let endpoint = env::var("APP_AI_ENDPOINT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let ai = AiConfig {
            endpoint,
            timeout: Duration::from_secs(env_number("APP_AI_TIMEOUT_SECS", 20)?),
        };

        let report = ReportConfig {
            debounce: Duration::from_millis(env_number("APP_AI_DEBOUNCE_MS", 1500)?),
            poll_interval: Duration::from_secs(env_number("APP_POLL_INTERVAL_SECS", 15)?),
        };

        let persistence = RetryPolicy {
            attempts: env_number("APP_WRITE_RETRY_ATTEMPTS", 3)?,
            delay: Duration::from_millis(env_number("APP_WRITE_RETRY_DELAY_MS", 200)?),
        };

        let defaults = ScoringWeights::default();
        let scoring = ScoringConfig {
            weights: ScoringWeights {
                positive: env_number("APP_SCORE_POSITIVE", defaults.positive)?,
                mild: env_number("APP_SCORE_MILD", defaults.mild)?,
                moderate: env_number("APP_SCORE_MODERATE", defaults.moderate)?,
                severe: env_number("APP_SCORE_SEVERE", defaults.severe)?,
            },
            standout_limit: env_number("APP_STANDOUT_LIMIT", 10)?,
            at_risk_severe_threshold: env_number("APP_AT_RISK_SEVERE_THRESHOLD", 3)?,
            performance: PerformanceWeights::default(),
        };

        let validation = ValidationConfig {
            min_description_len: env_number("APP_MIN_DESCRIPTION_LEN", 10)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            ai,
            report,
            persistence,
            scoring,
            validation,
        })
    }
}

fn env_number<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        _ => Ok(default),
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

/// External summary collaborator. No endpoint means narratives are disabled.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

/// Timing knobs for the report orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Bounded read-after-write retry used after persisting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    pub min_description_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_description_len: 10,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => write!(f, "{var} must be a valid number"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
