//! axum router for the repair API and the chat relay.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use repairs_core::authorship::{CallerContext, ContextSource};
use repairs_core::config::ServiceConfig;
use repairs_core::db::query::RepairFilter;
use repairs_core::error::{ErrorCode, RepairError};
use repairs_core::model::ticket::{NewRepair, RepairTicket};
use repairs_core::store::TicketStore;
use repairs_core::tickets;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::{ApiKeyGate, require_api_key};
use crate::relay::{Activity, ChatRelay, FAILURE_REPLY, Reply};
use crate::validate;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TicketStore>,
}

/// Build the service router.
///
/// `/healthz` is open; `/repairs*` and `/api/messages` sit behind the
/// bearer gate. `/api/messages` is only routed when the relay is configured.
///
/// # Errors
///
/// Returns [`RepairError::Config`] when no API key is configured or the
/// relay settings are incomplete.
pub fn router(config: &ServiceConfig, store: Arc<dyn TicketStore>) -> Result<Router, RepairError> {
    let gate = ApiKeyGate::new(config.require_api_key()?);
    let state = AppState { store };

    let mut protected = Router::new()
        .route("/repairs", post(create_repair).get(list_repairs))
        .route("/repairs/{repair_id}", get(get_repair));
    if let Some(relay_config) = config.relay()? {
        let relay = ChatRelay::new(relay_config)
            .map_err(|err| RepairError::Config(format!("relay client: {err:#}")))?;
        protected = protected.merge(
            Router::new()
                .route("/api/messages", post(relay_message))
                .with_state(Arc::new(relay)),
        );
    }
    let protected = protected.route_layer(middleware::from_fn_with_state(gate, require_api_key));

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

/// An error rendered as `{"code", "message", "hint"?}` JSON.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, message)
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalUnexpected,
            ErrorCode::InternalUnexpected.message(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            code: self.code.code(),
            message: self.message,
            hint: self.code.hint(),
        });
        let mut response = (self.status, body).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<RepairError> for ApiError {
    fn from(err: RepairError) -> Self {
        let code = err.code();
        match err {
            RepairError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, code, err.to_string())
            }
            RepairError::WriteFailed(_) | RepairError::ReadFailed(_) | RepairError::Config(_) => {
                error!(error = %err, code = %code, "repair store operation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, code.message())
            }
        }
    }
}

impl From<validate::ValidationError> for ApiError {
    fn from(err: validate::ValidationError) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ValidationFailed,
            err.to_string(),
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, ErrorCode::ValidationFailed, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            rejection.body_text(),
        )
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, RepairError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => {
            error!(error = %err, "blocking store task failed");
            Err(ApiError::internal())
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct RequestHeaders<'a>(&'a HeaderMap);

impl ContextSource for RequestHeaders<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_repair(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewRepair>, JsonRejection>,
) -> Result<(StatusCode, Json<RepairTicket>), ApiError> {
    let Json(new) = payload?;
    validate::validate_new_repair(&new)?;

    let caller = CallerContext::resolve(&RequestHeaders(&headers));
    let store = Arc::clone(&state.store);
    let ticket = run_blocking(move || tickets::create_ticket(store.as_ref(), new, &caller)).await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    status: Option<String>,
    assigned_to: Option<String>,
    created_by: Option<String>,
}

impl From<ListParams> for RepairFilter {
    fn from(params: ListParams) -> Self {
        Self {
            status: params.status,
            assigned_to: params.assigned_to,
            created_by: params.created_by,
        }
    }
}

async fn list_repairs(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<RepairTicket>>, ApiError> {
    let Query(params) = params?;
    let filter = RepairFilter::from(params);
    let store = Arc::clone(&state.store);
    let found = run_blocking(move || tickets::list_tickets(store.as_ref(), &filter)).await?;
    Ok(Json(found))
}

async fn get_repair(
    State(state): State<AppState>,
    Path(repair_id): Path<String>,
) -> Result<Json<RepairTicket>, ApiError> {
    let store = Arc::clone(&state.store);
    let ticket = run_blocking(move || tickets::get_ticket(store.as_ref(), &repair_id)).await?;
    Ok(Json(ticket))
}

async fn relay_message(
    State(relay): State<Arc<ChatRelay>>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(activity) = payload?;
    match relay.respond(&activity).await {
        Ok(reply) => Ok(Json(reply).into_response()),
        Err(err) => {
            error!(
                error = %format!("{err:#}"),
                code = %ErrorCode::RelayUnavailable,
                "chat relay failed"
            );
            let reply = Json(Reply::message(FAILURE_REPLY));
            Ok((StatusCode::BAD_GATEWAY, reply).into_response())
        }
    }
}
