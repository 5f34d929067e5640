//! HTTP API for swaps, quotes, transaction status and health checks

use crate::config::ApiConfig;
use crate::coordination::{SwapEngine, SwapRequest};
use crate::error::{SwapError, SwapResult};
use crate::types::{Status, TransactionRecord};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SwapEngine>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, engine: Arc<SwapEngine>) -> SwapResult<()> {
    let app = router(AppState { engine });

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwapError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| SwapError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/connect", post(connect))
        .route("/currencies", get(list_currencies))
        .route("/resolve", get(resolve_currency))
        .route("/quote", get(get_quote))
        .route("/plans", post(create_plan))
        .route("/swaps", post(create_swap))
        .route("/instructions", post(interpret_instruction))
        .route("/transactions", get(list_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction).delete(delete_transaction),
        )
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response wrapper for handlers
pub struct ApiError(SwapError);

impl From<SwapError> for ApiError {
    fn from(err: SwapError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);

        let mut body = ErrorBody {
            error: err.user_message(),
            field: None,
            hop_index: None,
            required: None,
            orphaned: Vec::new(),
        };

        if err.is_invalid_address() {
            body.field = Some("destinationAddress");
        }
        match err {
            SwapError::BelowMinimum {
                hop_index,
                required,
                ..
            } => {
                body.hop_index = Some(hop_index);
                body.required = Some(required);
            }
            SwapError::PlanExecution {
                failed_hop_index,
                orphaned,
                ..
            } => {
                body.hop_index = Some(failed_hop_index);
                body.orphaned = orphaned;
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

fn status_for(err: &SwapError) -> StatusCode {
    if err.is_invalid_address() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    match err {
        SwapError::BelowMinimum { .. }
        | SwapError::InvalidPlan(_)
        | SwapError::InvalidAmount(_)
        | SwapError::UnknownCurrency(_) => StatusCode::BAD_REQUEST,
        SwapError::ProviderUnreachable => StatusCode::SERVICE_UNAVAILABLE,
        SwapError::Provider { .. }
        | SwapError::PlanExecution { .. }
        | SwapError::PollTransient { .. } => StatusCode::BAD_GATEWAY,
        SwapError::InvalidAddress { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SwapError::Config(_) | SwapError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - provider reached and catalog loaded
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.engine.is_connected();
    let response = ReadinessResponse {
        ready,
        currencies: state.engine.catalog().await.len(),
        tracked: state.engine.tracker().tracked_ids().len(),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Retry the provider connection
async fn connect(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let currencies = state.engine.connect().await?;
    Ok(Json(ConnectResponse { currencies }))
}

async fn list_currencies(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if !state.engine.is_connected() {
        return Err(SwapError::ProviderUnreachable.into());
    }
    Ok(Json(state.engine.catalog().await))
}

async fn resolve_currency(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = state
        .engine
        .resolve_currency(&query.mention, query.network.as_deref())
        .await?;
    Ok(Json(currency))
}

async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state
        .engine
        .quote_pair(&query.from, &query.to, query.amount.as_deref())
        .await?;
    Ok(Json(quote))
}

async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.engine.plan(&request).await?;
    Ok(Json(plan))
}

async fn create_swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let executed = state.engine.swap(&request).await?;
    Ok((StatusCode::CREATED, Json(executed)))
}

async fn interpret_instruction(
    State(state): State<AppState>,
    Json(request): Json<InstructionRequest>,
) -> impl IntoResponse {
    Json(state.engine.interpret(&request.text).await)
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> impl IntoResponse {
    let ledger = state.engine.ledger();

    let mut records: Vec<TransactionRecord> = match query.currency.as_deref() {
        Some(ticker) => ledger.list_by_currency(ticker),
        None => ledger.list_all(),
    };

    if let Some(status) = query.status {
        records.retain(|r| r.status == status);
    }

    Json(records)
}

async fn get_transaction(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.ledger().get(&id) {
        Some(record) => Json(record).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Administrative delete; also stops tracking the id
async fn delete_transaction(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.engine.tracker().untrack(&id);
    if state.engine.ledger().delete_record(&id) {
        info!("Deleted transaction {}", id);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Get transaction statistics
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.ledger().stats())
}

// Request and response types

#[derive(Deserialize)]
struct ResolveQuery {
    mention: String,
    network: Option<String>,
}

#[derive(Deserialize)]
struct QuoteQuery {
    from: String,
    to: String,
    amount: Option<String>,
}

#[derive(Deserialize)]
struct TransactionsQuery {
    status: Option<Status>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct InstructionRequest {
    text: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    currencies: usize,
    tracked: usize,
}

#[derive(Serialize)]
struct ConnectResponse {
    currencies: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hop_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    orphaned: Vec<TransactionRecord>,
}
