use hirely::config::{AppConfig, MailConfig, WorkflowConfig};
use hirely::error::AppError;
use hirely::notifications::{LogMailer, MailError, Mailer, OutboundEmail, ResendMailer};
use hirely::persistence::SqliteStore;
use hirely::workflows::{JobExpiration, JobListingDigest, StepRunner};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mail transport picked from configuration: Resend when an API key is present,
/// otherwise messages are only logged.
pub(crate) enum ConfiguredMailer {
    Resend(ResendMailer),
    Log(LogMailer),
}

impl Mailer for ConfiguredMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        match self {
            ConfiguredMailer::Resend(mailer) => mailer.send(email),
            ConfiguredMailer::Log(mailer) => mailer.send(email),
        }
    }
}

/// Builds the configured mailer. Must run on a blocking thread.
pub(crate) fn configured_mailer(config: &MailConfig) -> Result<Arc<ConfiguredMailer>, AppError> {
    let mailer = match &config.api_key {
        Some(api_key) => ConfiguredMailer::Resend(ResendMailer::new(api_key, &config.from)?),
        None => {
            info!("MAIL_API_KEY not set; digest emails will be logged instead of sent");
            ConfiguredMailer::Log(LogMailer::new(&config.from))
        }
    };
    Ok(Arc::new(mailer))
}

pub(crate) fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>, AppError> {
    Ok(Arc::new(SqliteStore::open(&config.database.path)?))
}

/// Step runner with the expiration and digest functions registered against `store`.
pub(crate) fn build_runner<M>(
    store: Arc<SqliteStore>,
    mailer: Arc<M>,
    public_url: &str,
    workflows: &WorkflowConfig,
) -> StepRunner<SqliteStore>
where
    M: Mailer + 'static,
{
    let mut runner = StepRunner::new(store.clone());
    if let Ok(lease) = chrono::Duration::from_std(workflows.run_lease) {
        runner = runner.with_lease(lease);
    }
    runner.register(Arc::new(JobExpiration::new(store.clone())));
    runner.register(Arc::new(JobListingDigest::new(store, mailer, public_url)));
    runner
}

pub(crate) fn join_error(err: JoinError) -> AppError {
    AppError::Io(std::io::Error::other(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_registers_both_workflows() {
        let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
        let mailer = Arc::new(ConfiguredMailer::Log(LogMailer::new("Hirely <test@example.com>")));

        let workflows = WorkflowConfig {
            poll_interval: std::time::Duration::from_secs(30),
            run_lease: std::time::Duration::from_secs(90),
        };

        let runner = build_runner(store, mailer, "https://jobs.example.com", &workflows);

        let ids: Vec<_> = runner.function_ids().collect();
        assert_eq!(ids, vec!["job-expiration", "send-job-listings"]);
        assert_eq!(runner.lease(), chrono::Duration::seconds(90));
    }

    #[test]
    fn missing_api_key_falls_back_to_log_mailer() {
        let config = MailConfig {
            api_key: None,
            from: "Hirely <test@example.com>".to_string(),
        };
        let mailer = configured_mailer(&config).expect("mailer");
        assert!(matches!(mailer.as_ref(), ConfiguredMailer::Log(_)));
    }
}
