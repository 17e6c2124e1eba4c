use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const MAX_LEASE_SECONDS: u64 = 24 * 60 * 60;

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
    pub database: DatabaseConfig,
    pub payments: PaymentsConfig,
    pub mail: MailConfig,
    pub workflows: WorkflowConfig,
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
        let public_url = env::var("APP_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "hirely.db".to_string());

        let webhook_secret = optional_var("STRIPE_WEBHOOK_SECRET");
        if webhook_secret.is_none() && environment == AppEnvironment::Production {
            return Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"));
        }

        let poll_seconds = env::var("WORKFLOW_POLL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .ok()
            .filter(|seconds| *seconds > 0)
            .ok_or(ConfigError::InvalidPollInterval)?;

        let lease_seconds = env::var("WORKFLOW_LEASE_SECONDS")
            .unwrap_or_else(|_| "600".to_string())
            .parse::<u64>()
            .ok()
            .filter(|seconds| (1..=MAX_LEASE_SECONDS).contains(seconds))
            .ok_or(ConfigError::InvalidLease)?;

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                public_url,
            },
            telemetry: TelemetryConfig { log_level },
            database: DatabaseConfig {
                path: PathBuf::from(database_path),
            },
            payments: PaymentsConfig {
                stripe_secret_key: optional_var("STRIPE_SECRET_KEY"),
                webhook_secret,
            },
            mail: MailConfig {
                api_key: optional_var("MAIL_API_KEY"),
                from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "Hirely <onboarding@resend.dev>".to_string()),
            },
            workflows: WorkflowConfig {
                poll_interval: Duration::from_secs(poll_seconds),
                run_lease: Duration::from_secs(lease_seconds),
            },
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL, used for checkout redirects and digest links.
    pub public_url: String,
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

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Payment processor credentials.
#[derive(Clone)]
pub struct PaymentsConfig {
    pub stripe_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("stripe_secret_key", &self.stripe_secret_key.as_ref().map(|_| "***"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub from: String,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .finish()
    }
}

/// Background step runner controls.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub poll_interval: Duration,
    /// Claims older than this are considered abandoned and requeued.
    pub run_lease: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPollInterval,
    InvalidLease,
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPollInterval => {
                write!(f, "WORKFLOW_POLL_SECONDS must be a positive integer")
            }
            ConfigError::InvalidLease => {
                write!(f, "WORKFLOW_LEASE_SECONDS must be between 1 and {MAX_LEASE_SECONDS}")
            }
            ConfigError::Missing(key) => write!(f, "{key} must be set in production"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidPollInterval
            | ConfigError::InvalidLease
            | ConfigError::Missing(_) => None,
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
            "APP_PUBLIC_URL",
            "APP_LOG_LEVEL",
            "DATABASE_PATH",
            "STRIPE_SECRET_KEY",
            "STRIPE_WEBHOOK_SECRET",
            "MAIL_API_KEY",
            "MAIL_FROM",
            "WORKFLOW_POLL_SECONDS",
            "WORKFLOW_LEASE_SECONDS",
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
        assert_eq!(config.server.public_url, "http://localhost:3000");
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.database.path, PathBuf::from("hirely.db"));
        assert!(config.payments.webhook_secret.is_none());
        assert_eq!(config.workflows.poll_interval, Duration::from_secs(30));
        assert_eq!(config.workflows.run_lease, Duration::from_secs(600));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn production_requires_webhook_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        match AppConfig::load() {
            Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET")) => {}
            other => panic!("expected missing secret, got {other:?}"),
        }

        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.payments.webhook_secret.as_deref(), Some("whsec_test"));
        reset_env();
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("WORKFLOW_POLL_SECONDS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPollInterval)
        ));
        reset_env();
    }

    #[test]
    fn lease_must_be_positive_and_bounded() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        for value in ["0", "86401", "ten"] {
            env::set_var("WORKFLOW_LEASE_SECONDS", value);
            assert!(
                matches!(AppConfig::load(), Err(ConfigError::InvalidLease)),
                "{value} should be rejected"
            );
        }

        env::set_var("WORKFLOW_LEASE_SECONDS", "120");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.workflows.run_lease, Duration::from_secs(120));
        reset_env();
    }

    #[test]
    fn debug_output_masks_secrets() {
        let payments = PaymentsConfig {
            stripe_secret_key: Some("sk_live_secret".to_string()),
            webhook_secret: Some("whsec_secret".to_string()),
        };
        let rendered = format!("{payments:?}");
        assert!(!rendered.contains("sk_live_secret"));
        assert!(!rendered.contains("whsec_secret"));
    }
}
