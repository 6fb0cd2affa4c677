//! The operator-facing HTTP surface: enqueue a task, look it up, inspect
//! and retry the dead-letter queue, list and toggle hooks, audit a
//! routing decision, and query the transaction log. Routes follow the
//! `axum::Router` + `State` pattern this workspace's HTTP services use
//! elsewhere (see `telemetry.rs`), scaled up from a single metrics route
//! to the full operator API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use orchestrator_core::{Priority, Task};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::platform::config::AdminSettings;
use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;

pub fn admin_service(settings: AdminSettings) -> ServiceRegistration {
    ServiceRegistration::new(
        "admin-http",
        Arc::new(move |ctx: PlatformContext, token: CancellationToken| {
            let settings = settings.clone();
            tokio::spawn(async move {
                let addr: SocketAddr = settings.bind_address.parse()?;
                let app = router(ctx);
                let listener = tokio::net::TcpListener::bind(addr).await?;
                info!(%addr, "admin http server started");

                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        token.cancelled().await;
                        info!("shutting down admin http server");
                    })
                    .await?;

                Ok::<(), anyhow::Error>(())
            })
        }),
    )
}

fn router(ctx: PlatformContext) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tasks", post(enqueue_task))
        .route("/tasks/:id", get(get_task))
        .route("/dlq", get(list_dlq))
        .route("/dlq/:id/retry", post(retry_dlq))
        .route("/hooks", get(list_hooks))
        .route("/hooks/:id/enable", post(enable_hook))
        .route("/hooks/:id/disable", post(disable_hook))
        .route("/routing/:task_id", get(routing_decision))
        .route("/txlog", get(query_txlog))
        .with_state(ctx)
}

/// A uniform error envelope so every admin route can bail out with `?`
/// via `AdminError::from` and still produce a JSON body.
struct AdminError(StatusCode, String);

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl<E: std::error::Error> From<E> for AdminError {
    fn from(err: E) -> Self {
        AdminError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    task_type: Option<String>,
    prompt: String,
    #[serde(default = "default_priority")]
    priority: Priority,
    #[serde(default = "default_complexity")]
    complexity: u8,
    #[serde(default)]
    preferred_agent: Option<String>,
}

fn default_complexity() -> u8 {
    3
}

fn default_priority() -> Priority {
    Priority::Normal
}

/// `POST /tasks` — routes the task to an agent and pushes it onto that
/// agent's ready queue, returning the assigned id and routing decision.
async fn enqueue_task(
    State(ctx): State<PlatformContext>,
    Json(req): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, AdminError> {
    let mut task = Task::new(req.id, req.task_type, req.prompt, req.priority, req.complexity)
        .map_err(|e| AdminError(StatusCode::BAD_REQUEST, e.to_string()))?;
    task.preferred_agent = req.preferred_agent.or(task.preferred_agent);

    let decision = ctx.router().route(&task).await?;
    ctx.queue_fabric().enqueue(&task, &decision.primary_agent).await?;

    Ok(Json(serde_json::json!({
        "task_id": task.id,
        "assigned_agent": decision.primary_agent,
        "decision": decision,
    })))
}

/// `GET /tasks/:id` — the `getTaskInfo` lookup, backed by the `task:{id}`
/// hash `TaskStore` maintains (see its module doc for why this exists
/// instead of scraping queue contents).
async fn get_task(State(ctx): State<PlatformContext>, Path(id): Path<String>) -> Result<Response, AdminError> {
    match ctx.queue_fabric().store().get(&id).await? {
        Some(info) => Ok(Json(info).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "task not found" }))).into_response()),
    }
}

async fn list_dlq(State(ctx): State<PlatformContext>) -> Result<impl IntoResponse, AdminError> {
    let records = ctx.retry_engine().dlq.list().await?;
    Ok(Json(records))
}

/// `POST /dlq/:id/retry` — `ForceRetry`: pulls the record back out of the
/// dead-letter queue and reschedules it at its original error class's
/// max attempts rather than an arbitrary fixed budget.
async fn retry_dlq(State(ctx): State<PlatformContext>, Path(id): Path<String>) -> Result<impl IntoResponse, AdminError> {
    let record = ctx.retry_engine().force_retry(&id).await?;
    Ok(Json(record))
}

async fn list_hooks(State(ctx): State<PlatformContext>) -> impl IntoResponse {
    Json(ctx.hook_registry().list())
}

async fn enable_hook(State(ctx): State<PlatformContext>, Path(id): Path<String>) -> Result<impl IntoResponse, AdminError> {
    ctx.hook_registry().broadcast_change(&id, true).await?;
    Ok(Json(serde_json::json!({ "id": id, "enabled": true })))
}

async fn disable_hook(State(ctx): State<PlatformContext>, Path(id): Path<String>) -> Result<impl IntoResponse, AdminError> {
    ctx.hook_registry().broadcast_change(&id, false).await?;
    Ok(Json(serde_json::json!({ "id": id, "enabled": false })))
}

async fn routing_decision(State(ctx): State<PlatformContext>, Path(task_id): Path<String>) -> Result<Response, AdminError> {
    match ctx.router().cached_decision(&task_id).await? {
        Some(decision) => Ok(Json(decision).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "no routing decision on record" }))).into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct TxLogWindow {
    start_ms: u64,
    end_ms: u64,
    #[serde(default)]
    task_type: Option<String>,
    #[serde(default)]
    queue: Option<String>,
}

/// `GET /txlog?start_ms=..&end_ms=..` — windowed event query plus the
/// hourly timeline, top queues, and error rate summaries, so an operator
/// gets the full analytics surface in one call instead of four.
async fn query_txlog(State(ctx): State<PlatformContext>, Query(window): Query<TxLogWindow>) -> Result<impl IntoResponse, AdminError> {
    let filter = orchestrator_txlog::EventFilter { task_type: window.task_type, queue: window.queue };
    let query = ctx.txlog_query();
    let events = query.events_in_window(window.start_ms, window.end_ms, &filter).await?;
    let timeline = query.hourly_timeline(window.start_ms, window.end_ms).await?;
    let top_queues = query.top_queues(window.start_ms, window.end_ms, 10).await?;
    let error_rate = query.error_rate(window.start_ms, window.end_ms).await?;

    Ok(Json(serde_json::json!({
        "events": events,
        "hourly_timeline": timeline,
        "top_queues": top_queues,
        "error_rate": error_rate,
    })))
}
