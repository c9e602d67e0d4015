//! Gateway server: JSON API over the stream plus the observer socket

use crate::error::{ApiError, ApiResult};
use crate::ws::handle_observer;
use archivefever_core::{question_context, Broadcaster, Error, GatewayConfig, ThoughtOrigin};
use archivefever_store::{NewUpload, Store};
use archivefever_stream::{ResearchDesk, Scheduler, ThoughtEngine};
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_PAGE: usize = 200;
const MAX_PAGE: usize = 1_000;
const MANUAL_CONTEXT: &str = "Manual trigger - philosophical reflection";

/// Everything the handlers reach.
pub struct AppState {
    pub engine: Arc<ThoughtEngine>,
    pub store: Arc<dyn Store>,
    pub scheduler: Arc<Scheduler>,
    pub desk: Arc<ResearchDesk>,
    pub broadcaster: Broadcaster,
    /// Thoughts sent to an observer on connect.
    pub initial_stream_len: usize,
    pub started_at: Instant,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/stream", get(stream_handler))
        .route("/api/state", get(state_handler))
        .route("/api/crystallized-works", get(works_handler))
        .route("/api/identity-history", get(identity_history_handler))
        .route("/api/discovered-texts", get(discovered_texts_handler))
        .route("/api/research-requests", get(research_requests_handler))
        .route("/api/research-requests/:id/comments", post(comment_handler))
        .route("/api/research-requests/:id/upload", post(upload_handler))
        .route("/api/generate-thought", post(generate_handler))
        .route("/api/ask", post(ask_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn start_gateway(
    config: GatewayConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;
    let app = router(state);

    info!("Archive Fever gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Observers:    ws://{}/ws", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.name(),
        "streamActive": state.scheduler.is_active(),
        "observers": state.broadcaster.observer_count(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let offset = query.offset.unwrap_or(0);
    let thoughts = state.store.recent_thoughts(limit, offset).await.map_err(Error::from)?;
    let total = state.store.count_thoughts().await.map_err(Error::from)?;
    Ok(Json(serde_json::json!({
        "thoughts": thoughts,
        "total": total,
        "hasMore": offset.saturating_add(limit) < total,
    })))
}

async fn state_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let identity = state.store.current_identity().await;
    let works = state.store.crystallized_works().await.map_err(Error::from)?;
    let recent = state.store.recent_thoughts(5, 0).await.map_err(Error::from)?;
    Ok(Json(serde_json::json!({
        "currentIdentity": identity,
        "totalWorks": works.len(),
        "recentWorks": works.iter().take(3).collect::<Vec<_>>(),
        "streamActive": state.scheduler.is_active(),
        "recentThoughts": recent,
    })))
}

async fn works_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.crystallized_works().await.map_err(Error::from)?))
}

async fn identity_history_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.identity_history().await.map_err(Error::from)?))
}

async fn discovered_texts_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_discovered_texts().await.map_err(Error::from)?))
}

async fn research_requests_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .store
            .list_research_requests_with_counts()
            .await
            .map_err(Error::from)?,
    ))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateBody {
    context: Option<String>,
}

/// Run one generation now and answer with it; reactions continue after the
/// response is sent.
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<GenerateBody>>,
) -> ApiResult<impl IntoResponse> {
    let context = body
        .and_then(|Json(b)| b.context)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| MANUAL_CONTEXT.to_string());
    info!("Manual thought generation: {:?}", context);

    let thought = state
        .engine
        .generate_thought(&context, ThoughtOrigin::Spontaneous)
        .await?;

    let engine = state.engine.clone();
    let reacting = thought.clone();
    tokio::spawn(async move { engine.react(&reacting).await });

    Ok(Json(serde_json::json!({
        "success": true,
        "thought": thought,
        "message": "Thought generated successfully",
    })))
}

#[derive(Debug, Deserialize)]
struct AskBody {
    question: String,
}

/// Queue a human question as the context of a fresh cycle.
pub(crate) fn spawn_question(state: &Arc<AppState>, question: &str) -> Result<(), ApiError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::validation("question is required").into());
    }
    let origin = ThoughtOrigin::Question {
        question: question.to_string(),
    };
    info!("Question injected: {:?}", question);
    state.scheduler.trigger_once(question_context(question), origin);
    Ok(())
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskBody>,
) -> ApiResult<impl IntoResponse> {
    spawn_question(&state, &body.question)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" }))))
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    author_name: Option<String>,
    #[serde(default)]
    content: String,
}

async fn comment_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> ApiResult<impl IntoResponse> {
    let id = state
        .desk
        .comment(&request_id, body.author_name.as_deref(), &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id, "success": true }))))
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    #[serde(default)]
    title: String,
    author: Option<String>,
    #[serde(default)]
    content: String,
    uploaded_by: Option<String>,
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(body): Json<UploadBody>,
) -> ApiResult<impl IntoResponse> {
    let upload = NewUpload {
        title: body.title,
        author: body.author,
        content: body.content,
        uploaded_by: body.uploaded_by,
    };
    let id = state.desk.upload(&request_id, upload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id, "success": true }))))
}
