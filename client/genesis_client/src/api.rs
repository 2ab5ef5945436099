//! Axum REST API over the session manager and the contract gateway.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::gateway::{ContractGateway, NewProject, ProjectEdit};
use crate::models::{Address, Backer, Project, Stats};
use crate::provider::TxReceipt;
use crate::session::SessionManager;
use crate::state::SessionState;

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<SessionManager>,
    pub gateway: Arc<ContractGateway>,
    pub state: Arc<SessionState>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(get_session))
        .route("/session/connect", post(connect))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/backers", get(get_backers))
        .route("/projects/:id/back", post(back_project))
        .route("/projects/:id/payout", post(payout_project))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub wallet_present: bool,
    pub connected_account: Option<Address>,
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<Project>,
    pub stats: Stats,
}

#[derive(Serialize)]
pub struct BackersResponse {
    pub project_id: u64,
    pub count: usize,
    pub backers: Vec<Backer>,
}

#[derive(Deserialize)]
pub struct BackRequest {
    pub amount: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct ApiError(ClientError);

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            status_for(&self.0),
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// HTTP status reported for a failed operation.
pub fn status_for(err: &ClientError) -> StatusCode {
    match err {
        e if e.is_input_error() => StatusCode::BAD_REQUEST,
        ClientError::NotConnected | ClientError::ConnectionRejected(_) => StatusCode::UNAUTHORIZED,
        ClientError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ClientError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /session`
pub async fn get_session(State(api): State<Arc<ApiState>>) -> Json<SessionResponse> {
    Json(SessionResponse {
        wallet_present: api.session.wallet_present(),
        connected_account: api.state.connected_account.get(),
    })
}

/// `POST /session/connect`
///
/// Prompts the wallet for authorization and makes the first account current.
pub async fn connect(State(api): State<Arc<ApiState>>) -> ApiResult<SessionResponse> {
    let account = api.session.connect().await?;
    Ok(Json(SessionResponse {
        wallet_present: true,
        connected_account: Some(account),
    }))
}

/// `GET /projects`
pub async fn list_projects(State(api): State<Arc<ApiState>>) -> ApiResult<ProjectsResponse> {
    let (projects, stats) = api.gateway.load_projects().await?;
    Ok(Json(ProjectsResponse {
        count: projects.len(),
        projects,
        stats,
    }))
}

/// `POST /projects`
pub async fn create_project(
    State(api): State<Arc<ApiState>>,
    Json(input): Json<NewProject>,
) -> Result<(StatusCode, Json<TxReceipt>), ApiError> {
    let receipt = api.gateway.create_project(&input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(api): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<Project> {
    Ok(Json(api.gateway.load_project(id).await?))
}

/// `PUT /projects/:id`
pub async fn update_project(
    State(api): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    Json(edit): Json<ProjectEdit>,
) -> ApiResult<TxReceipt> {
    Ok(Json(api.gateway.update_project(id, &edit).await?))
}

/// `DELETE /projects/:id`
pub async fn delete_project(
    State(api): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<TxReceipt> {
    Ok(Json(api.gateway.delete_project(id).await?))
}

/// `GET /projects/:id/backers`
pub async fn get_backers(
    State(api): State<Arc<ApiState>>,
    Path(project_id): Path<u64>,
) -> ApiResult<BackersResponse> {
    let backers = api.gateway.get_backers(project_id).await?;
    Ok(Json(BackersResponse {
        project_id,
        count: backers.len(),
        backers,
    }))
}

/// `POST /projects/:id/back`
pub async fn back_project(
    State(api): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    Json(request): Json<BackRequest>,
) -> ApiResult<TxReceipt> {
    Ok(Json(api.gateway.back_project(id, &request.amount).await?))
}

/// `POST /projects/:id/payout`
pub async fn payout_project(
    State(api): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<TxReceipt> {
    Ok(Json(api.gateway.payout_project(id).await?))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
