//! HTTP API tests: each test spawns the router on an ephemeral port and
//! drives it with `reqwest`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use repairs_core::config::{Secret, ServiceConfig};
use repairs_core::store::{MemoryStore, SqliteStore, TicketStore};
use repairs_server::http;
use repairs_server::relay::{FAILURE_REPLY, GREETING};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const API_KEY: &str = "test-key";

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

struct Running {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn spawn_app(app: Router) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = http::serve(listener, app, async {
            let _ = shutdown_rx.await;
        })
        .await;
    });

    Running {
        addr,
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    }
}

fn base_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.auth.api_key = Some(Secret::new(API_KEY));
    config
}

async fn spawn_service(config: &ServiceConfig, store: Arc<dyn TicketStore>) -> Running {
    let app = http::router(config, store).expect("router should build");
    spawn_app(app).await
}

async fn spawn_default() -> Running {
    spawn_service(&base_config(), Arc::new(MemoryStore::new())).await
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn create(server: &Running, body: Value, headers: &[(&str, &str)]) -> reqwest::Response {
    let mut request = client()
        .post(server.url("/repairs"))
        .bearer_auth(API_KEY)
        .json(&body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request.send().await.expect("create request")
}

async fn create_ok(server: &Running, body: Value, headers: &[(&str, &str)]) -> Value {
    let response = create(server, body, headers).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("created ticket json")
}

async fn list(server: &Running, query: &str) -> Vec<Value> {
    let response = client()
        .get(server.url(&format!("/repairs{query}")))
        .bearer_auth(API_KEY)
        .send()
        .await
        .expect("list request");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("list json")
}

fn ids(tickets: &[Value]) -> Vec<&str> {
    tickets.iter().filter_map(|t| t["id"].as_str()).collect()
}

// ---------------------------------------------------------------------------
// Health + auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_needs_no_auth() {
    let server = spawn_default().await;
    let response = client()
        .get(server.url("/healthz"))
        .send()
        .await
        .expect("healthz");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "ok");
    server.stop().await;
}

#[tokio::test]
async fn auth_failures_are_401_with_challenge() {
    let server = spawn_default().await;
    let cases: [(Option<&str>, &str); 4] = [
        (None, "Missing Authorization header."),
        (Some("Basic dGVzdC1rZXk="), "Invalid authorization scheme."),
        (Some("Bearer"), "Invalid authorization scheme."),
        (Some("Bearer wrong-key"), "Invalid API key."),
    ];

    for (authz, expected) in cases {
        let mut request = client().get(server.url("/repairs"));
        if let Some(value) = authz {
            request = request.header("authorization", value);
        }
        let response = request.send().await.expect("list request");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
        let body: Value = response.json().await.expect("error json");
        assert_eq!(body["code"], "E4001");
        assert_eq!(body["message"], expected);
    }
    server.stop().await;
}

#[tokio::test]
async fn rejected_create_never_reaches_store() {
    let store = Arc::new(MemoryStore::new());
    let server = spawn_service(&base_config(), store.clone()).await;

    let response = client()
        .post(server.url("/repairs"))
        .bearer_auth("nope")
        .json(&json!({"item": "Laptop", "description": "No power"}))
        .send()
        .await
        .expect("create request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(
        store
            .query(&Default::default())
            .expect("query store")
            .is_empty()
    );
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Repairs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_derives_authorship_and_round_trips() {
    let server = spawn_default().await;

    let created = create_ok(
        &server,
        json!({"item": "Laptop", "description": "Screen is flickering", "created_by": "mallory"}),
        &[
            ("x-microsoft-tenantid", "T1"),
            ("x-microsoft-ai-conversationid", "C1"),
        ],
    )
    .await;
    assert_eq!(created["created_by"], "T1|C1");
    assert_eq!(created["status"], "New");
    assert!(created["assigned_to"].is_null());
    let created_at = created["created_at"].as_str().expect("created_at");
    assert!(created_at.ends_with('Z'));

    let id = created["id"].as_str().expect("id");
    let fetched: Value = client()
        .get(server.url(&format!("/repairs/{id}")))
        .bearer_auth(API_KEY)
        .send()
        .await
        .expect("get request")
        .json()
        .await
        .expect("get json");
    assert_eq!(fetched, created);
    server.stop().await;
}

#[tokio::test]
async fn create_without_context_is_unknown() {
    let server = spawn_default().await;
    let lone_conversation = create_ok(
        &server,
        json!({"item": "Desk", "description": "Wobbly"}),
        &[("x-microsoft-ai-conversationid", "C1")],
    )
    .await;
    assert_eq!(lone_conversation["created_by"], "unknown");

    let tenant_only = create_ok(
        &server,
        json!({"item": "Desk", "description": "Wobbly"}),
        &[("x-microsoft-tenantid", "T9")],
    )
    .await;
    assert_eq!(tenant_only["created_by"], "T9");
    server.stop().await;
}

#[tokio::test]
async fn list_filters_intersect() {
    let store: Arc<dyn TicketStore> =
        Arc::new(SqliteStore::open_in_memory().expect("open sqlite store"));
    let server = spawn_service(&base_config(), store).await;

    let a = create_ok(
        &server,
        json!({"item": "Laptop", "description": "x", "assigned_to": "Jane Doe"}),
        &[("x-microsoft-tenantid", "T1")],
    )
    .await;
    let b = create_ok(
        &server,
        json!({"item": "Phone", "description": "x", "status": "Closed", "assigned_to": "JANE ROE"}),
        &[],
    )
    .await;
    let c = create_ok(&server, json!({"item": "Desk", "description": "x"}), &[]).await;
    let (a_id, b_id, c_id) = (a["id"].as_str(), b["id"].as_str(), c["id"].as_str());

    let everything = list(&server, "").await;
    assert_eq!(everything.len(), 3);

    assert_eq!(
        ids(&list(&server, "?assigned_to=jane").await),
        [a_id, b_id].map(|id| id.expect("created id"))
    );
    assert_eq!(
        ids(&list(&server, "?status=New&assigned_to=jane").await),
        [a_id.expect("created id")]
    );
    assert_eq!(
        ids(&list(&server, "?created_by=unknown&status=New").await),
        [c_id.expect("created id")]
    );
    assert!(list(&server, "?status=new").await.is_empty());
    let injected = list(&server, "?status=New%27%20OR%20%271%27%3D%271").await;
    assert!(injected.is_empty());
    assert_eq!(list(&server, "?status=&assigned_to=").await.len(), 3);
    server.stop().await;
}

#[tokio::test]
async fn missing_repair_is_404() {
    let server = spawn_default().await;
    let response = client()
        .get(server.url("/repairs/does-not-exist"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .expect("get request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("error json");
    assert_eq!(body["code"], "E2001");
    server.stop().await;
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let server = spawn_default().await;

    let blank = create(&server, json!({"item": "  ", "description": "x"}), &[]).await;
    assert_eq!(blank.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = blank.json().await.expect("error json");
    assert_eq!(body["code"], "E2005");
    assert_eq!(body["message"], "invalid item: must not be empty");

    let missing_field = create(&server, json!({"item": "Laptop"}), &[]).await;
    assert_eq!(missing_field.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let malformed = client()
        .post(server.url("/repairs"))
        .bearer_auth(API_KEY)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("create request");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert!(list(&server, "").await.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn messages_route_absent_without_relay() {
    let server = spawn_default().await;
    let response = client()
        .post(server.url("/api/messages"))
        .bearer_auth(API_KEY)
        .json(&json!({"type": "message", "text": "hi"}))
        .send()
        .await
        .expect("messages request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Chat relay
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Upstream {
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    fail: bool,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let key = headers
        .get("api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    upstream.seen.lock().expect("lock").push((key, body));

    if upstream.fail {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "boom"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [
                {"message": {"content": "Your ticket "}},
                {"message": {"content": null}},
                {"message": {"content": "is filed."}}
            ]
        })),
    )
}

async fn spawn_upstream(upstream: Upstream) -> Running {
    let app = Router::new()
        .route(
            "/openai/deployments/{deployment}/chat/completions",
            post(completions),
        )
        .with_state(upstream);
    spawn_app(app).await
}

fn relay_config(upstream: &Running) -> ServiceConfig {
    let mut config = base_config();
    config.relay.endpoint = Some(format!("http://{}", upstream.addr));
    config.relay.deployment = Some("gpt-test".to_string());
    config.relay.api_key = Some(Secret::new("upstream-key"));
    config
}

async fn post_activity(server: &Running, activity: Value) -> reqwest::Response {
    client()
        .post(server.url("/api/messages"))
        .bearer_auth(API_KEY)
        .json(&activity)
        .send()
        .await
        .expect("messages request")
}

#[tokio::test]
async fn relay_forwards_message_and_concatenates_choices() {
    let upstream_state = Upstream::default();
    let upstream = spawn_upstream(upstream_state.clone()).await;
    let server = spawn_service(&relay_config(&upstream), Arc::new(MemoryStore::new())).await;

    let activity = json!({"type": "message", "text": "my laptop broke"});
    let response = post_activity(&server, activity).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply: Value = response.json().await.expect("reply json");
    assert_eq!(
        reply,
        json!({"type": "message", "text": "Your ticket is filed."})
    );

    let seen = upstream_state.seen.lock().expect("lock").clone();
    assert_eq!(seen.len(), 1);
    let (key, body) = &seen[0];
    assert_eq!(key.as_deref(), Some("upstream-key"));
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(
        body["messages"][0]["content"],
        "You are an AI agent that can chat with users."
    );
    assert_eq!(
        body["messages"][1],
        json!({"role": "user", "content": "my laptop broke"})
    );

    server.stop().await;
    upstream.stop().await;
}

#[tokio::test]
async fn relay_greets_members_and_ignores_other_activities() {
    let upstream_state = Upstream::default();
    let upstream = spawn_upstream(upstream_state.clone()).await;
    let server = spawn_service(&relay_config(&upstream), Arc::new(MemoryStore::new())).await;

    let greeting: Value = post_activity(
        &server,
        json!({"type": "conversationUpdate", "membersAdded": [{"id": "u1"}]}),
    )
    .await
    .json()
    .await
    .expect("reply json");
    assert_eq!(greeting["text"], GREETING);

    let typing = post_activity(&server, json!({"type": "typing"})).await;
    assert_eq!(typing.status(), StatusCode::OK);
    let body: Value = typing.json().await.expect("reply json");
    assert!(body.get("text").is_none());

    assert!(upstream_state.seen.lock().expect("lock").is_empty());
    server.stop().await;
    upstream.stop().await;
}

#[tokio::test]
async fn relay_upstream_failure_is_502() {
    let upstream = spawn_upstream(Upstream {
        fail: true,
        ..Upstream::default()
    })
    .await;
    let server = spawn_service(&relay_config(&upstream), Arc::new(MemoryStore::new())).await;

    let response = post_activity(&server, json!({"type": "message", "text": "hello"})).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let reply: Value = response.json().await.expect("reply json");
    assert_eq!(reply["text"], FAILURE_REPLY);

    server.stop().await;
    upstream.stop().await;
}

#[tokio::test]
async fn relay_requires_bearer_token() {
    let upstream = spawn_upstream(Upstream::default()).await;
    let server = spawn_service(&relay_config(&upstream), Arc::new(MemoryStore::new())).await;

    let response = client()
        .post(server.url("/api/messages"))
        .json(&json!({"type": "message", "text": "hello"}))
        .send()
        .await
        .expect("messages request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
    upstream.stop().await;
}
