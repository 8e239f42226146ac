use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use shared_apiclient::{ApiClient, ApiErrorKind};
use tokio::net::TcpListener;

#[derive(Debug, serde::Deserialize)]
struct LoginReply {
    access_token: String,
}

#[tokio::test]
async fn e2e_bearer_post_roundtrip() {
    let server = TestServer::start().await;
    let client = ApiClient::with_base_url(server.base_url.clone());

    let reply: LoginReply = client
        .api_call_json("abc123", "login")
        .await
        .expect("login response should parse");

    assert_eq!(reply.access_token, "tok-1");
}

#[tokio::test]
async fn e2e_wrong_token_surfaces_as_rejected() {
    let server = TestServer::start().await;
    let client = ApiClient::with_base_url(server.base_url.clone());

    let err = client
        .api_call("wrong-token", "login")
        .await
        .expect_err("401 should surface to the caller");

    assert_eq!(err.kind(), ApiErrorKind::Rejected);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn e2e_get_route_carries_the_same_bearer_header() {
    let server = TestServer::start().await;
    let client = ApiClient::with_base_url(server.base_url.clone());

    let response = client
        .get("abc123", "api/campaigns-list")
        .await
        .expect("authenticated get should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), br#"[{"id":1}]"#);
}

#[tokio::test]
async fn e2e_post_body_is_empty_on_the_wire() {
    let server = TestServer::start().await;
    let client = ApiClient::with_base_url(server.base_url.clone());

    // The echo route answers 400 if any body bytes arrive.
    let response = client
        .api_call("abc123", "echo-body-len")
        .await
        .expect("empty-body post should succeed");
    assert_eq!(response.body(), b"0");
}

struct TestServer {
    base_url: String,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let app = Router::new()
            .route("/login", post(login_handler))
            .route("/api/campaigns-list", get(campaigns_handler))
            .route("/echo-body-len", post(echo_body_len_handler));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, task }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn login_handler(headers: HeaderMap) -> (StatusCode, &'static str) {
    match bearer_token(&headers) {
        Some("abc123") => (StatusCode::OK, r#"{"access_token":"tok-1"}"#),
        _ => (StatusCode::UNAUTHORIZED, "bad credentials"),
    }
}

async fn campaigns_handler(headers: HeaderMap) -> (StatusCode, &'static str) {
    match bearer_token(&headers) {
        Some("abc123") => (StatusCode::OK, r#"[{"id":1}]"#),
        _ => (StatusCode::UNAUTHORIZED, "bad credentials"),
    }
}

async fn echo_body_len_handler(headers: HeaderMap, body: String) -> (StatusCode, String) {
    if bearer_token(&headers).is_none() {
        return (StatusCode::UNAUTHORIZED, "bad credentials".to_string());
    }
    if body.is_empty() {
        (StatusCode::OK, "0".to_string())
    } else {
        (StatusCode::BAD_REQUEST, body.len().to_string())
    }
}
