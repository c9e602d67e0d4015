//! Tests for archivefever-gateway: routes, error mapping and the observer socket

use archivefever_core::*;
use archivefever_discovery::{DiscoveryConfig, DiscoveryError, DiscoveryResult, Fetcher, ReadingQueue, ReadingWorker, TextDiscovery};
use archivefever_gateway::{router, ApiError, AppState};
use archivefever_llm::{LlmProvider, LlmRequest, LlmResult};
use archivefever_store::{MemoryStore, Store};
use archivefever_stream::config::{ContextConfig, ModelConfig};
use archivefever_stream::{
    CompletionGateway, Crystallizer, DisabledPublisher, ReactionDispatcher, ResearchDesk, Scheduler,
    ThoughtEngine,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

// ===========================================================================
// Fixture
// ===========================================================================

struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }
    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        if request.system.is_some() {
            Ok("Every archive is haunted by what it leaves out.".into())
        } else {
            Ok(r#"{"type": "meta_observation"}"#.into())
        }
    }
}

struct NoFetch;

#[async_trait]
impl Fetcher for NoFetch {
    async fn fetch(&self, url: &str) -> DiscoveryResult<String> {
        Err(DiscoveryError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

struct Fixture {
    state: Arc<AppState>,
    store: Arc<MemoryStore>,
    _worker: ReadingWorker,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();
    let broadcaster = Broadcaster::new(64);
    let (readings, worker) = ReadingQueue::channel();

    let discovery = Arc::new(TextDiscovery::new(
        Vec::new(),
        Arc::new(NoFetch),
        dyn_store.clone(),
        broadcaster.clone(),
        readings,
        DiscoveryConfig::default(),
    ));
    let gateway = Arc::new(CompletionGateway::new(
        Arc::new(EchoProvider),
        dyn_store.clone(),
        ModelConfig::default(),
        ContextConfig::default(),
    ));
    let crystallizer = Crystallizer::new(
        gateway.clone(),
        dyn_store.clone(),
        broadcaster.clone(),
        Arc::new(DisabledPublisher),
        "https://archive.example.com",
    );
    let dispatcher = ReactionDispatcher::new(discovery.clone(), crystallizer, dyn_store.clone(), broadcaster.clone());
    let engine = Arc::new(ThoughtEngine::new(gateway, dyn_store.clone(), broadcaster.clone(), dispatcher));
    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        Duration::from_secs(45),
        Duration::from_secs(180),
    ));

    let state = Arc::new(AppState {
        engine,
        store: dyn_store.clone(),
        scheduler,
        desk: Arc::new(ResearchDesk::new(dyn_store, discovery)),
        broadcaster,
        initial_stream_len: 200,
        started_at: Instant::now(),
    });
    Fixture {
        state,
        store,
        _worker: worker,
    }
}

async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn seed_thoughts(store: &MemoryStore, n: usize) {
    for i in 0..n {
        store
            .append_thought(NewThought::new(format!("thought {}", i), ThoughtKind::RawThought))
            .await
            .unwrap();
    }
}

async fn wait_for_thoughts(store: &MemoryStore, n: usize) {
    for _ in 0..100 {
        if store.count_thoughts().await.unwrap() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} thoughts", n);
}

// ===========================================================================
// Read routes
// ===========================================================================

#[tokio::test]
async fn health_reports_status() {
    let f = fixture();
    let (status, body) = call(&f.state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["streamActive"], false);
}

#[tokio::test]
async fn stream_paginates_newest_first() {
    let f = fixture();
    seed_thoughts(&f.store, 3).await;

    let (status, body) = call(&f.state, get("/api/stream?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["thoughts"].as_array().unwrap().len(), 2);
    assert_eq!(body["thoughts"][0]["content"], "thought 2");

    let (_, body) = call(&f.state, get("/api/stream?limit=2&offset=2")).await;
    assert_eq!(body["thoughts"].as_array().unwrap().len(), 1);
    assert_eq!(body["thoughts"][0]["content"], "thought 0");
    assert_eq!(body["hasMore"], false);

    let (_, body) = call(&f.state, get("/api/stream?offset=10")).await;
    assert!(body["thoughts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stream_offset_at_usize_max_is_an_empty_page() {
    let f = fixture();
    seed_thoughts(&f.store, 3).await;

    let (status, body) = call(&f.state, get(&format!("/api/stream?offset={}", usize::MAX))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["thoughts"].as_array().unwrap().is_empty());
    assert_eq!(body["total"], 3);
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn state_reports_seed_identity() {
    let f = fixture();
    seed_thoughts(&f.store, 7).await;
    let (status, body) = call(&f.state, get("/api/state")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentIdentity"]["name"], DEFAULT_IDENTITY_NAME);
    assert_eq!(body["totalWorks"], 0);
    assert_eq!(body["recentThoughts"].as_array().unwrap().len(), 5);
    assert_eq!(body["streamActive"], false);
}

#[tokio::test]
async fn listing_routes_return_arrays() {
    let f = fixture();
    for uri in [
        "/api/crystallized-works",
        "/api/identity-history",
        "/api/discovered-texts",
        "/api/research-requests",
    ] {
        let (status, body) = call(&f.state, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert!(body.as_array().unwrap().is_empty(), "{}", uri);
    }
}

// ===========================================================================
// Write routes
// ===========================================================================

#[tokio::test]
async fn generate_thought_answers_with_the_thought() {
    let f = fixture();
    let (status, body) = call(&f.state, Request::post("/api/generate-thought").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["thought"]["thought"], "Every archive is haunted by what it leaves out.");
    assert_eq!(body["thought"]["type"], "meta_observation");
    assert_eq!(f.store.count_thoughts().await.unwrap(), 1);
}

#[tokio::test]
async fn ask_validates_and_spawns_a_cycle() {
    let f = fixture();
    let (status, body) = call(&f.state, post_json("/api/ask", serde_json::json!({ "question": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("question"));

    let (status, _) = call(
        &f.state,
        post_json("/api/ask", serde_json::json!({ "question": "What is an archive?" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_thoughts(&f.store, 1).await;
    assert!(!f.state.scheduler.is_active(), "a question must not start the timer");

    let thought = &f.store.recent_thoughts(1, 0).await.unwrap()[0];
    assert_eq!(
        thought.metadata.origin,
        ThoughtOrigin::Question {
            question: "What is an archive?".into()
        }
    );
}

#[tokio::test]
async fn comments_map_errors_to_status_codes() {
    let f = fixture();
    let request = ResearchRequest::text_request("Bergson duration", "help");
    f.store.append_research_request(&request).await.unwrap();

    let (status, body) = call(
        &f.state,
        post_json("/api/research-requests/missing/comments", serde_json::json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let uri = format!("/api/research-requests/{}/comments", request.id);
    let (status, _) = call(&f.state, post_json(&uri, serde_json::json!({ "content": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &f.state,
        post_json(&uri, serde_json::json!({ "author_name": "Ada", "content": "Try Matter and Memory" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());

    let (_, rows) = call(&f.state, get("/api/research-requests")).await;
    assert_eq!(rows[0]["comment_count"], 1);
    assert_eq!(rows[0]["query"], "Bergson duration");
}

#[tokio::test]
async fn upload_registers_a_human_text() {
    let f = fixture();
    let request = ResearchRequest::text_request("Bergson duration", "help");
    f.store.append_research_request(&request).await.unwrap();

    let uri = format!("/api/research-requests/{}/upload", request.id);
    let (status, _) = call(
        &f.state,
        post_json(&uri, serde_json::json!({ "title": "On Duration", "content": "word ".repeat(400) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, texts) = call(&f.state, get("/api/discovered-texts")).await;
    assert_eq!(texts[0]["title"], "On Duration");
    assert_eq!(texts[0]["source"], HUMAN_UPLOAD_SOURCE);
    assert_eq!(texts[0]["discovered_for"], request.id);
    assert!(texts[0].get("content").is_none());

    let (status, _) = call(&f.state, post_json(&uri, serde_json::json!({ "content": "no title" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn server_errors_map_to_500() {
    let response = ApiError(Error::Storage("disk full".into())).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        ApiError(Error::llm_error("anthropic", "down")).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn client_errors_keep_their_status() {
    for e in [Error::validation("content required"), Error::not_found("request r-1")] {
        assert!(ApiError(e).status().is_client_error());
    }
    assert_eq!(ApiError(Error::not_found("request r-1")).status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError(Error::validation("content required")).status(), StatusCode::BAD_REQUEST);
    assert!(!Error::Storage("disk full".into()).is_client_error());
}

// ===========================================================================
// Observer socket
// ===========================================================================

#[tokio::test]
async fn observer_gets_backlog_then_live_thoughts() {
    let f = fixture();
    seed_thoughts(&f.store, 2).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(f.state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    let first = next_json(&mut socket).await;
    assert_eq!(first["type"], "initial_stream");
    assert_eq!(first["data"].as_array().unwrap().len(), 2);

    socket
        .send(Message::Text(
            r#"{"type":"inject_question","question":"Why is there something?"}"#.into(),
        ))
        .await
        .unwrap();

    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "new_thought");
    assert_eq!(event["data"]["origin"], "question");
    assert_eq!(event["data"]["question"], "Why is there something?");
}

async fn next_json<S>(socket: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for observer event")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}
