use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Client as ReqwestClient;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use reqwest::Method;

/// Base address the original frontend hardcodes; every route is appended to it.
pub const API_BASE_URL: &str = "http://localhost:5000";

pub type ApiBytes = Bytes;
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type ApiResult<T> = Result<T, ApiError>;

/// Request state for a mock that mirrors transport behavior (optional for callers).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApiTransportState {
    #[default]
    Idle,
    Busy,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    Rejected,
    Parse,
    Internal,
}

#[derive(Clone, Debug, Error)]
#[error("api error {kind:?} status={status:?} {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn connect(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(ApiErrorKind::Connect, status, message)
    }

    pub fn send(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(ApiErrorKind::Send, status, message)
    }

    pub fn receive(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(ApiErrorKind::Receive, status, message)
    }

    pub fn timeout(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(ApiErrorKind::Timeout, status, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Rejected, Some(status), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Internal, None, message)
    }

    pub fn from_reqwest(kind: ApiErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ApiErrorKind::Timeout
        } else {
            kind
        };
        let status = err.status().map(|s| s.as_u16());
        Self::new(kind, status, err.to_string())
    }

    pub fn from_sonic(err: sonic_rs::Error) -> Self {
        Self::new(ApiErrorKind::Parse, None, err.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, ApiBytes)>,
    pub body: Option<ApiBytes>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<ApiBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attaches `Authorization: Bearer <token>`. The token is opaque here:
    /// not validated, not parsed, forwarded byte for byte.
    pub fn bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn with_body(mut self, body: impl Into<ApiBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, ApiBytes)>,
    pub body: ApiBytes,
    pub elapsed: Duration,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        sonic_rs::from_slice(&self.body).map_err(ApiError::from_sonic)
    }
}

pub trait ApiTransport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>>;
}

pub type SharedApiTransport = dyn ApiTransport + Send + Sync;

/// Client over a fixed base URL. Routes are appended verbatim, the way the
/// original helper does it: `<base_url>/<api_route>`, no escaping, no
/// validation of either input.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<SharedApiTransport>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    pub fn with_transport<T>(transport: T) -> Self
    where
        T: ApiTransport + 'static,
    {
        Self {
            base_url: API_BASE_URL.to_string(),
            transport: Arc::new(transport),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, api_route: &str) -> String {
        format!("{}/{}", self.base_url, api_route)
    }

    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        self.transport.execute(request).await
    }

    /// The original helper: POST `<base_url>/<api_route>` with a bearer header
    /// and an empty body. The Authorization entry goes in the transport header
    /// map, never in the payload. A non-2xx status is an error, not a silent
    /// pass.
    pub async fn api_call(&self, token: &str, api_route: &str) -> ApiResult<ApiResponse> {
        let request = ApiRequest::post(self.endpoint(api_route)).bearer(token);
        self.checked(request).await
    }

    pub async fn api_call_json<T>(&self, token: &str, api_route: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        self.api_call(token, api_route).await?.json::<T>()
    }

    /// Authenticated GET against the same base, for the read-only routes.
    pub async fn get(&self, token: &str, api_route: &str) -> ApiResult<ApiResponse> {
        let request = ApiRequest::get(self.endpoint(api_route)).bearer(token);
        self.checked(request).await
    }

    pub async fn get_json<T>(&self, token: &str, api_route: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        self.get(token, api_route).await?.json::<T>()
    }

    async fn checked(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let response = self.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            let message = String::from_utf8_lossy(response.body()).into_owned();
            Err(ApiError::rejected(response.status, message))
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiTransport for ReqwestTransport {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut req = client.request(request.method.clone(), &request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_bytes(value.as_ref())
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req
                .send()
                .await
                .map_err(|err| ApiError::from_reqwest(ApiErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| ApiError::from_reqwest(ApiErrorKind::Receive, err))?;
            let elapsed = start.elapsed();

            Ok(ApiResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
