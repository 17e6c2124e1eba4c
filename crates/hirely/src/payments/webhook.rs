use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::signature::{WebhookVerifier, SIGNATURE_HEADER};
use crate::board::domain::JobPostId;
use crate::board::repository::BoardRepository;
use crate::board::router::run_blocking;
use crate::board::service::{JobBoardError, JobBoardService};
use crate::workflows::EventSink;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletedCheckout {
    /// Either a customer id or an expanded customer object.
    #[serde(default)]
    pub customer: Option<Value>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CompletedCheckout {
    pub fn customer_id(&self) -> Option<&str> {
        let id = match self.customer.as_ref()? {
            Value::String(id) => Some(id.as_str()),
            Value::Object(object) => object.get("id").and_then(Value::as_str),
            _ => None,
        };
        id.filter(|id| !id.is_empty())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get("jobId")
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

pub struct WebhookState<R, E> {
    service: Arc<JobBoardService<R, E>>,
    verifier: WebhookVerifier,
}

impl<R, E> WebhookState<R, E> {
    pub fn new(service: Arc<JobBoardService<R, E>>, verifier: WebhookVerifier) -> Self {
        Self { service, verifier }
    }
}

/// Router exposing the payment provider webhook.
pub fn webhook_router<R, E>(state: Arc<WebhookState<R, E>>) -> Router
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    Router::new()
        .route("/api/webhook/stripe", post(stripe_webhook_handler::<R, E>))
        .with_state(state)
}

fn webhook_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn stripe_webhook_handler<R, E>(
    State(state): State<Arc<WebhookState<R, E>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = state.verifier.verify(&body, signature, Utc::now()) {
        warn!(error = %err, "rejected webhook with invalid signature");
        return webhook_response(StatusCode::BAD_REQUEST, "Webhook error");
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "signed webhook body is not a valid event");
            return webhook_response(StatusCode::BAD_REQUEST, "Webhook error");
        }
    };

    if event.event_type != CHECKOUT_COMPLETED {
        debug!(event_type = %event.event_type, "ignoring webhook event");
        return (StatusCode::OK, Json(json!({ "received": true }))).into_response();
    }

    let session: CompletedCheckout = serde_json::from_value(event.data.object).unwrap_or_default();
    let Some(job_id) = session.job_id() else {
        return webhook_response(StatusCode::BAD_REQUEST, "No job ID found");
    };
    let Some(customer_id) = session.customer_id() else {
        return webhook_response(StatusCode::BAD_REQUEST, "No customer found");
    };

    let job_id = JobPostId::from(job_id);
    let customer_id = customer_id.to_string();
    let paid_job = job_id.clone();
    let confirmed = run_blocking(state.service.clone(), move |service| {
        service.confirm_payment(&customer_id, &paid_job)
    })
    .await;
    match confirmed {
        Ok(outcome) => {
            info!(
                event_id = event.id.as_deref().unwrap_or("unknown"),
                %job_id,
                ?outcome,
                "checkout completion applied"
            );
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(JobBoardError::NotFound(entity)) => {
            webhook_response(StatusCode::NOT_FOUND, format!("{entity} not found"))
        }
        Err(JobBoardError::Forbidden(_)) => webhook_response(
            StatusCode::FORBIDDEN,
            "Job does not belong to user's company",
        ),
        Err(other) => {
            error!(%job_id, error = %other, "webhook processing failed");
            webhook_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Webhook processing failed: {other}"),
            )
        }
    }
}
