use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    CompanyInput, JobFilter, JobPostId, JobPostInput, JobSeekerInput, SavedJobId, UserId,
};
use super::repository::{BoardRepository, RepositoryError};
use super::service::{JobBoardError, JobBoardService, LISTING_PAGE_SIZE};
use crate::workflows::EventSink;

/// Header set by the identity proxy in front of the service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Public listing query string: `?page=2&jobTypes=full-time,contract&location=Germany`.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub page: Option<i64>,
    #[serde(rename = "jobTypes")]
    pub job_types: Option<String>,
    pub location: Option<String>,
}

impl ListingQuery {
    fn page(&self) -> u32 {
        self.page
            .map(|page| page.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Router builder exposing the listing, saved-job, and onboarding endpoints.
pub fn board_router<R, E>(service: Arc<JobBoardService<R, E>>) -> Router
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/jobs",
            get(list_jobs_handler::<R, E>).post(create_job_handler::<R, E>),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(job_detail_handler::<R, E>)
                .put(update_job_handler::<R, E>)
                .delete(delete_job_handler::<R, E>),
        )
        .route("/api/v1/jobs/:job_id/save", post(save_job_handler::<R, E>))
        .route(
            "/api/v1/saved-jobs/:saved_id",
            delete(unsave_job_handler::<R, E>),
        )
        .route("/api/v1/favorites", get(favorites_handler::<R, E>))
        .route("/api/v1/my-jobs", get(company_jobs_handler::<R, E>))
        .route(
            "/api/v1/companies/:name",
            get(company_profile_handler::<R, E>),
        )
        .route("/api/v1/users", post(register_user_handler::<R, E>))
        .route(
            "/api/v1/onboarding/company",
            post(onboard_company_handler::<R, E>),
        )
        .route(
            "/api/v1/onboarding/job-seeker",
            post(onboard_job_seeker_handler::<R, E>),
        )
        .with_state(service)
}

/// Reads the acting user from [`USER_ID_HEADER`], answering 401 when absent.
pub fn acting_user(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or_else(|| {
            let payload = json!({ "error": "authentication required" });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

/// Runs a service call on the blocking pool; the repository may hold a database lock.
pub(crate) async fn run_blocking<R, E, T, F>(
    service: Arc<JobBoardService<R, E>>,
    call: F,
) -> Result<T, JobBoardError>
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
    T: Send + 'static,
    F: FnOnce(&JobBoardService<R, E>) -> Result<T, JobBoardError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .unwrap_or_else(|join| {
            Err(JobBoardError::Repository(RepositoryError::Unavailable(
                format!("board task failed: {join}"),
            )))
        })
}

pub(crate) fn service_error_response(error: JobBoardError) -> Response {
    let status = match &error {
        JobBoardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        JobBoardError::NotFound(_) => StatusCode::NOT_FOUND,
        JobBoardError::Forbidden(_) => StatusCode::FORBIDDEN,
        JobBoardError::Conflict(_) => StatusCode::CONFLICT,
        JobBoardError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        JobBoardError::Repository(err) => {
            error!(error = %err, "repository failure while serving request");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

pub(crate) async fn list_jobs_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let filter = JobFilter::from_query(query.job_types.as_deref(), query.location.as_deref());
    let result = run_blocking(service, move |service| {
        service.list_active_jobs(&filter, query.page(), LISTING_PAGE_SIZE)
    })
    .await;
    match result {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn job_detail_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let viewer = acting_user(&headers).ok();
    let result = run_blocking(service, move |service| {
        service.job_detail(&JobPostId(job_id), viewer.as_ref())
    })
    .await;
    match result {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn create_job_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
    Json(input): Json<JobPostInput>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.create_job(input, &user_id)
    })
    .await;
    match result {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn update_job_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<JobPostInput>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.update_job(&JobPostId(job_id), input, &user_id)
    })
    .await;
    match result {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn delete_job_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.delete_job(&JobPostId(job_id), &user_id)
    })
    .await;
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn save_job_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.save_job(&JobPostId(job_id), &user_id)
    })
    .await;
    match result {
        Ok(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn unsave_job_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(saved_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.unsave_job(&SavedJobId(saved_id), &user_id)
    })
    .await;
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn favorites_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.favorites(&user_id)
    })
    .await;
    match result {
        Ok(favorites) => (StatusCode::OK, Json(favorites)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn company_jobs_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.company_jobs(&user_id)
    })
    .await;
    match result {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn company_profile_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    Path(name): Path<String>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let result = run_blocking(service, move |service| {
        service.company_profile(&name)
    })
    .await;
    match result {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn register_user_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
    Json(request): Json<RegisterUserRequest>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.register_user(user_id, &request.email, &request.name)
    })
    .await;
    match result {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn onboard_company_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
    Json(input): Json<CompanyInput>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.onboard_company(&user_id, input)
    })
    .await;
    match result {
        Ok(company) => (StatusCode::CREATED, Json(company)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn onboard_job_seeker_handler<R, E>(
    State(service): State<Arc<JobBoardService<R, E>>>,
    headers: HeaderMap,
    Json(input): Json<JobSeekerInput>,
) -> Response
where
    R: BoardRepository + 'static,
    E: EventSink + 'static,
{
    let user_id = match acting_user(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let result = run_blocking(service, move |service| {
        service.onboard_job_seeker(&user_id, input)
    })
    .await;
    match result {
        Ok(seeker) => (StatusCode::CREATED, Json(seeker)).into_response(),
        Err(error) => service_error_response(error),
    }
}
