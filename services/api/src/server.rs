use crate::cli::ServeArgs;
use crate::infra::{self, join_error, AppState};
use crate::routes::with_operational_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use hirely::board::{board_router, JobBoardService};
use hirely::config::AppConfig;
use hirely::error::AppError;
use hirely::payments::{
    checkout_router, webhook_router, CheckoutService, StripeCheckoutGateway, WebhookState,
    WebhookVerifier,
};
use hirely::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // SQLite and the blocking HTTP clients are set up away from the async workers.
    let setup_config = config.clone();
    let (store, mailer, gateway) = tokio::task::spawn_blocking(move || -> Result<_, AppError> {
        let store = infra::open_store(&setup_config)?;
        let mailer = infra::configured_mailer(&setup_config.mail)?;
        let gateway = setup_config
            .payments
            .stripe_secret_key
            .as_deref()
            .map(StripeCheckoutGateway::new)
            .transpose()?
            .map(Arc::new);
        Ok((store, mailer, gateway))
    })
    .await
    .map_err(join_error)??;

    let runner = Arc::new(infra::build_runner(
        store.clone(),
        mailer,
        &config.server.public_url,
        &config.workflows,
    ));
    let board = Arc::new(JobBoardService::new(store.clone(), runner.clone()));

    let mut app: Router = board_router(board.clone());
    match config.payments.webhook_secret.as_deref() {
        Some(secret) => {
            let verifier = WebhookVerifier::new(secret)?;
            app = app.merge(webhook_router(Arc::new(WebhookState::new(
                board.clone(),
                verifier,
            ))));
        }
        None => warn!("STRIPE_WEBHOOK_SECRET not set; payment webhook disabled"),
    }
    match gateway {
        Some(gateway) => {
            let checkout = CheckoutService::new(store, gateway, config.server.public_url.clone());
            app = app.merge(checkout_router(Arc::new(checkout)));
        }
        None => warn!("STRIPE_SECRET_KEY not set; checkout disabled"),
    }

    let app = with_operational_routes(app)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let shutdown = CancellationToken::new();
    let workflows = tokio::spawn(
        runner
            .clone()
            .run_until_cancelled(config.workflows.poll_interval, shutdown.clone()),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hirely job board ready");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "unable to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    workflows.await.map_err(join_error)?;
    Ok(())
}
