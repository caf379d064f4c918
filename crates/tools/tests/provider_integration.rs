use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use proto::{ProviderError, ToolContext, ToolError};
use serde_json::{Value, json};
use tools::{
    AuthorizationStatus, HttpToolProvider, RemoteTool, Tool, ToolProvider, authorize_tools,
};

const API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct MockState {
    status_polls: Arc<AtomicUsize>,
    executions: Arc<std::sync::Mutex<Vec<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_KEY}"))
}

async fn formatted_tool(Path(name): Path<String>) -> (StatusCode, Json<Value>) {
    if name != "Google_SendEmail" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": format!("tool {name} not found")})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "type": "function",
            "function": {
                "name": "Google_SendEmail",
                "description": "Send an email",
                "parameters": {
                    "type": "object",
                    "properties": {"recipient": {"type": "string"}, "body": {"type": "string"}},
                    "required": ["recipient", "body"]
                }
            }
        })),
    )
}

async fn authorize(Json(body): Json<Value>) -> Json<Value> {
    if body["tool_name"] == "Google_SendEmail" {
        Json(json!({"id": "auth-42", "status": "pending", "url": "https://auth.test/login"}))
    } else {
        Json(json!({"id": "auth-0", "status": "completed"}))
    }
}

async fn auth_status(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if params.get("id").map(String::as_str) != Some("auth-42") || !params.contains_key("wait") {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad poll"})));
    }
    let polls = state.status_polls.fetch_add(1, Ordering::SeqCst);
    let status = if polls == 0 { "pending" } else { "completed" };
    (StatusCode::OK, Json(json!({"id": "auth-42", "status": status})))
}

async fn execute(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "invalid api key"})),
        );
    }
    state.executions.lock().unwrap().push(body.clone());
    if body["user_id"] == "stranger" {
        return (
            StatusCode::OK,
            Json(json!({
                "success": false,
                "output": {"authorization": {"status": "pending", "url": "https://auth.test/login"}}
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "output": {"value": {"sent_to": body["input"]["recipient"]}}})),
    )
}

async fn spawn_mock() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/v1/formatted_tools/{name}", get(formatted_tool))
        .route("/v1/tools/authorize", post(authorize))
        .route("/v1/auth/status", get(auth_status))
        .route("/v1/tools/execute", post(execute))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn remote_tool_round_trip_against_mock_provider() {
    let (base_url, state) = spawn_mock().await;
    let provider: Arc<dyn ToolProvider> = Arc::new(HttpToolProvider::new(&base_url, API_KEY));

    let tool = RemoteTool::load(Arc::clone(&provider), "Google_SendEmail")
        .await
        .expect("definition");
    assert_eq!(tool.name(), "Google_SendEmail");
    assert_eq!(tool.parameters_schema()["required"][0], "recipient");

    let out = tool
        .invoke(
            json!({"recipient": "a@b.com", "body": "hi"}),
            &ToolContext::new("mateo@example.com", "call-1"),
        )
        .await
        .expect("execute");
    assert_eq!(out, r#"{"sent_to":"a@b.com"}"#);

    let executions = state.executions.lock().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["tool_name"], "Google_SendEmail");
    assert_eq!(executions[0]["user_id"], "mateo@example.com");
}

#[tokio::test]
async fn unknown_tool_definition_maps_to_api_error() {
    let (base_url, _state) = spawn_mock().await;
    let provider = HttpToolProvider::new(&base_url, API_KEY);

    let err = provider
        .definition("Nope_Missing")
        .await
        .expect_err("missing tool");
    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "tool Nope_Missing not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn wrong_api_key_is_reported_as_provider_error() {
    let (base_url, _state) = spawn_mock().await;
    let provider = HttpToolProvider::new(&base_url, "wrong");

    let err = provider
        .execute("Google_SendEmail", json!({}), "mateo@example.com")
        .await
        .expect_err("unauthorized");
    assert!(matches!(
        err,
        ToolError::Provider(ProviderError::Api { status: 401, .. })
    ));
}

#[tokio::test]
async fn unauthorized_user_gets_login_url() {
    let (base_url, _state) = spawn_mock().await;
    let provider = HttpToolProvider::new(&base_url, API_KEY);

    let err = provider
        .execute("Google_SendEmail", json!({"recipient": "x"}), "stranger")
        .await
        .expect_err("needs authorization");
    match err {
        ToolError::AuthorizationRequired { url, .. } => assert_eq!(url, "https://auth.test/login"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn authorize_tools_polls_until_grant_completes() {
    let (base_url, state) = spawn_mock().await;
    let provider = HttpToolProvider::new(&base_url, API_KEY).with_wait_secs(1);

    let first = provider
        .authorize("Google_SendEmail", "mateo@example.com")
        .await
        .expect("authorize");
    assert_eq!(first.status, AuthorizationStatus::Pending);

    let mut login_urls = Vec::new();
    let names = vec![
        "Google_ListEmails".to_string(),
        "Google_SendEmail".to_string(),
    ];
    authorize_tools(&provider, &names, "mateo@example.com", |tool, url| {
        login_urls.push(format!("{tool} {url}"))
    })
    .await
    .expect("authorized");

    assert_eq!(login_urls, vec!["Google_SendEmail https://auth.test/login"]);
    assert_eq!(state.status_polls.load(Ordering::SeqCst), 2);
}
