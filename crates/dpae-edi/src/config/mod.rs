use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::time::Duration;

use crate::workflows::dpae::{PollingConfig, SubmissionMode};

pub const DEFAULT_AUTH_URL: &str = "https://mon.urssaf.fr/authentifier_dpae";
pub const DEFAULT_SUBMIT_URL: &str = "https://depot.dpae-edi.urssaf.fr/deposer-dsn/1.0/";
pub const DEFAULT_CONSULTATION_URL: &str =
    "https://consultation.dpae-edi.urssaf.fr/lister-retours-flux/2.0/";

/// Distinguishes runtime behavior for different stages of the client.
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

    /// Only a production deployment files real declarations by default.
    pub fn default_submission_mode(self) -> SubmissionMode {
        match self {
            Self::Production => SubmissionMode::Production,
            Self::Development | Self::Test => SubmissionMode::Test,
        }
    }
}

/// Top-level configuration for the declaration client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub endpoints: EndpointConfig,
    pub http: HttpConfig,
    pub polling: PollingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("DPAE_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let endpoints = EndpointConfig {
            auth: env::var("DPAE_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string()),
            submit: env::var("DPAE_SUBMIT_URL").unwrap_or_else(|_| DEFAULT_SUBMIT_URL.to_string()),
            consultation: env::var("DPAE_CONSULTATION_URL")
                .unwrap_or_else(|_| DEFAULT_CONSULTATION_URL.to_string()),
        };

        let http = HttpConfig {
            timeout: Duration::from_secs(number("DPAE_HTTP_TIMEOUT_SECS", 60)?),
        };

        let polling = PollingConfig {
            first_delay: Duration::from_millis(number("DPAE_POLL_FIRST_DELAY_MS", 1_000)?),
            retry_delay: Duration::from_millis(number("DPAE_POLL_RETRY_DELAY_MS", 10_000)?),
            max_attempts: number("DPAE_POLL_MAX_ATTEMPTS", 60)?,
        };

        let log_level = env::var("DPAE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            endpoints,
            http,
            polling,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            endpoints: EndpointConfig::default(),
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

fn number<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|source| ConfigError::InvalidNumber { variable, source }),
        Err(_) => Ok(default),
    }
}

/// Base URLs of the three service endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub auth: String,
    pub submit: String,
    pub consultation: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            auth: DEFAULT_AUTH_URL.to_string(),
            submit: DEFAULT_SUBMIT_URL.to_string(),
            consultation: DEFAULT_CONSULTATION_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Applied to every outbound request.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber {
        variable: &'static str,
        source: ParseIntError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { variable, .. } => {
                write!(f, "{variable} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidNumber { source, .. } => Some(source),
        }
    }
}
