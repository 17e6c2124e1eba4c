use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::board::catalog::pricing_tier;
use crate::board::domain::{JobPostId, JobPostStatus, UserId};
use crate::board::repository::{BoardRepository, RepositoryError};
use crate::board::router::acting_user;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Parameters of a one-off payment for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub job_id: JobPostId,
    pub product_name: String,
    pub description: String,
    pub unit_amount_cents: u64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Hosted payment provider. Called from blocking contexts only.
pub trait CheckoutGateway: Send + Sync {
    fn create_customer(&self, email: &str, name: &str) -> Result<String, PaymentGatewayError>;
    fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentGatewayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentGatewayError {
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
    #[error("payment gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not permitted to pay for this job")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Gateway(#[from] PaymentGatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Starts hosted checkout sessions for DRAFT listings.
pub struct CheckoutService<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
    public_url: String,
}

impl<R, G> CheckoutService<R, G>
where
    R: BoardRepository + 'static,
    G: CheckoutGateway + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<G>, public_url: impl Into<String>) -> Self {
        Self {
            repository,
            gateway,
            public_url: public_url.into(),
        }
    }

    /// Creates the gateway customer on first use, then a session priced from the
    /// listing's tier and tagged with the job id.
    pub fn start_checkout(
        &self,
        job_id: &JobPostId,
        user_id: &UserId,
    ) -> Result<CheckoutSession, CheckoutError> {
        let user = self
            .repository
            .user(user_id)?
            .ok_or(CheckoutError::NotFound("user"))?;
        let company = self
            .repository
            .company_for_user(user_id)?
            .ok_or(CheckoutError::Forbidden)?;
        let job = self
            .repository
            .job(job_id)?
            .ok_or(CheckoutError::NotFound("job"))?;
        if job.company_id != company.id {
            return Err(CheckoutError::Forbidden);
        }
        if job.status != JobPostStatus::Draft {
            return Err(CheckoutError::Conflict(format!(
                "job is {} and cannot be paid for",
                job.status.as_str()
            )));
        }
        let tier = pricing_tier(job.listing_duration).ok_or_else(|| {
            CheckoutError::Conflict(format!(
                "no pricing tier for {} days",
                job.listing_duration
            ))
        })?;

        let customer_id = match user.stripe_customer_id {
            Some(customer_id) => customer_id,
            None => {
                let customer_id = self.gateway.create_customer(&user.email, &user.name)?;
                self.repository.set_customer_id(&user.id, &customer_id)?;
                info!(%user_id, "payment customer created");
                customer_id
            }
        };

        let base = self.public_url.trim_end_matches('/');
        let request = CheckoutRequest {
            customer_id,
            job_id: job.id.clone(),
            product_name: format!("Job Posting - {} Days", tier.days),
            description: tier.description.to_string(),
            unit_amount_cents: tier.price_cents(),
            success_url: format!("{base}/payment/success"),
            cancel_url: format!("{base}/payment/cancel"),
        };
        let session = self.gateway.create_session(&request)?;
        info!(%job_id, session_id = %session.id, "checkout session created");
        Ok(session)
    }
}

/// Router exposing checkout creation for listing owners.
pub fn checkout_router<R, G>(service: Arc<CheckoutService<R, G>>) -> Router
where
    R: BoardRepository + 'static,
    G: CheckoutGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/jobs/:job_id/checkout",
            post(start_checkout_handler::<R, G>),
        )
        .with_state(service)
}

pub(crate) async fn start_checkout_handler<R, G>(
    State(service): State<Arc<CheckoutService<R, G>>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    G: CheckoutGateway + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let job_id = JobPostId(job_id);
    let result =
        tokio::task::spawn_blocking(move || service.start_checkout(&job_id, &user_id)).await;

    let (status, message) = match result {
        Ok(Ok(session)) => return (StatusCode::OK, Json(session)).into_response(),
        Ok(Err(CheckoutError::NotFound(entity))) => {
            (StatusCode::NOT_FOUND, format!("{entity} not found"))
        }
        Ok(Err(CheckoutError::Forbidden)) => {
            (StatusCode::FORBIDDEN, CheckoutError::Forbidden.to_string())
        }
        Ok(Err(CheckoutError::Conflict(message))) => (StatusCode::CONFLICT, message),
        Ok(Err(err @ CheckoutError::Gateway(_))) => {
            error!(error = %err, "checkout gateway failure");
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        Ok(Err(err @ CheckoutError::Repository(_))) => {
            error!(error = %err, "repository failure during checkout");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        Err(join) => {
            error!(error = %join, "checkout task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "checkout failed".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

/// Stripe REST client using form-encoded requests.
pub struct StripeCheckoutGateway {
    client: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeCheckoutGateway {
    /// Builds the blocking HTTP client. Must not be called from inside an async task.
    pub fn new(secret_key: impl Into<String>) -> Result<Self, PaymentGatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| PaymentGatewayError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        })
    }

    fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, PaymentGatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(form)
            .send()
            .map_err(|err| PaymentGatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PaymentGatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .map_err(|err| PaymentGatewayError::InvalidResponse(err.to_string()))
    }
}

impl CheckoutGateway for StripeCheckoutGateway {
    fn create_customer(&self, email: &str, name: &str) -> Result<String, PaymentGatewayError> {
        let form = [("email", email.to_string()), ("name", name.to_string())];
        let customer: CustomerResponse = self.post_form("/customers", &form)?;
        Ok(customer.id)
    }

    fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentGatewayError> {
        let form = [
            ("customer", request.customer_id.clone()),
            ("mode", "payment".to_string()),
            ("billing_address_collection", "required".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                request.unit_amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                request.description.clone(),
            ),
            ("metadata[jobId]", request.job_id.to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];
        let session: SessionResponse = self.post_form("/checkout/sessions", &form)?;
        let url = session.url.ok_or_else(|| {
            PaymentGatewayError::InvalidResponse("checkout session has no url".to_string())
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}
