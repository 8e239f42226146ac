use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use sonic_rs::to_vec;

use super::adapter::{
    ApiBytes, ApiError, ApiErrorKind, ApiFuture, ApiRequest, ApiResponse, ApiResult, ApiTransport,
    ApiTransportState,
};

/// Scripted outcome for one request, popped in FIFO order. When the plan is
/// exhausted the mock falls back to its response queues.
#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Pass,
    Delay(Duration),
    Reject {
        status: u16,
        reason: String,
    },
    ConnectError {
        reason: String,
    },
    SendError {
        reason: String,
    },
    ReceiveError {
        reason: String,
    },
    TimeoutError {
        reason: String,
    },
    InternalError {
        reason: String,
    },
    Drop,
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn delay(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    pub fn reject(status: u16, reason: impl Into<String>) -> Self {
        Self::Reject {
            status,
            reason: reason.into(),
        }
    }

    pub fn connect_error(reason: impl Into<String>) -> Self {
        Self::ConnectError {
            reason: reason.into(),
        }
    }

    pub fn send_error(reason: impl Into<String>) -> Self {
        Self::SendError {
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>) -> Self {
        Self::ReceiveError {
            reason: reason.into(),
        }
    }

    pub fn timeout_error(reason: impl Into<String>) -> Self {
        Self::TimeoutError {
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }

    pub fn drop_response() -> Self {
        Self::Drop
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }

    fn remaining(&self) -> usize {
        self.request.len()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, ApiBytes)>,
    pub body: ApiBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<ApiBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<ApiBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize>(status: u16, payload: &T) -> ApiResult<Self> {
        let body = to_vec(payload).map_err(ApiError::from_sonic)?;
        Ok(Self::new(status, body))
    }
}

#[derive(Clone, Debug)]
pub struct MockApiSnapshot {
    pub state: ApiTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub elapsed_total: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct MockApiTransportState {
    state: ApiTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    outbound_log: Vec<ApiRequest>,
    inbound_log: Vec<ApiResponse>,
    last_error: Option<String>,
    elapsed_total: Duration,
}

impl MockApiTransportState {
    fn snapshot(&self) -> MockApiSnapshot {
        MockApiSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.remaining(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            inbound_count: self.inbound_log.len(),
            outbound_count: self.outbound_log.len(),
            elapsed_total: self.elapsed_total,
            last_error: self.last_error.clone(),
        }
    }
}

/// In-memory transport: never touches the network, replays queued responses
/// and scripted failures so tests stay fully deterministic.
#[derive(Clone, Debug)]
pub struct MockApiTransport {
    state: Arc<Mutex<MockApiTransportState>>,
}

impl MockApiTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockApiTransportState::default())),
        }
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let mock = Self::new();
        mock.lock("installing behavior plan").behavior_plan = behavior_plan;
        mock
    }

    pub fn snapshot(&self) -> MockApiSnapshot {
        self.lock("taking snapshot").snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.lock("queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(
        &self,
        method: Method,
        url: impl Into<String>,
        response: MockResponse,
    ) {
        let key = (method, url.into());
        self.lock("queueing response by route")
            .route_response_queues
            .entry(key)
            .or_default()
            .push_back(response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    pub fn queue_get_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::GET, url, response);
    }

    pub fn outbound_requests(&self) -> Vec<ApiRequest> {
        self.lock("reading outbound log").outbound_log.clone()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.lock("reading last request").outbound_log.last().cloned()
    }

    pub fn outbound_count(&self) -> usize {
        self.lock("reading outbound count").outbound_log.len()
    }

    pub fn inbound_count(&self) -> usize {
        self.lock("reading inbound count").inbound_log.len()
    }

    pub fn clear_logs(&self) {
        let mut state = self.lock("clearing logs");
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    fn lock(&self, action: &str) -> std::sync::MutexGuard<'_, MockApiTransportState> {
        self.state
            .lock()
            .unwrap_or_else(|_| panic!("mock-apiclient mutex poisoned while {action}"))
    }

    fn pop_behavior(&self) -> MockBehavior {
        self.lock("reading behavior plan").behavior_plan.pop()
    }

    fn next_response(&self, request: &ApiRequest) -> Option<MockResponse> {
        let mut state = self.lock("selecting response");
        let route_key = (request.method.clone(), request.url.clone());
        if let Some(queue) = state.route_response_queues.get_mut(&route_key)
            && let Some(response) = queue.pop_front()
        {
            return Some(response);
        }
        state.default_response_queue.pop_front()
    }

    fn record_error(&self, error: &ApiError) {
        let mut state = self.lock("recording error");
        state.state = ApiTransportState::Error;
        state.last_error = Some(error.message.clone());
        state.last_status = error.status;
    }

    fn fail(&self, error: ApiError) -> ApiError {
        self.record_error(&error);
        error
    }
}

impl Default for MockApiTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiTransport for MockApiTransport {
    fn execute(&self, request: ApiRequest) -> ApiFuture<ApiResult<ApiResponse>> {
        let mock = self.clone();
        Box::pin(async move {
            let behavior = mock.pop_behavior();
            if let MockBehavior::Delay(duration) = behavior {
                std::thread::sleep(duration);
            }

            let start = Instant::now();
            {
                let mut state = mock.lock("updating state before execute");
                state.outbound_log.push(request.clone());
                state.request_count += 1;
                state.last_url = Some(request.url.clone());
                state.state = ApiTransportState::Busy;
                state.last_error = None;
            }

            match behavior {
                MockBehavior::Drop => {
                    return Err(mock.fail(ApiError::timeout(
                        "mock transport dropped response",
                        None,
                    )));
                }
                MockBehavior::ConnectError { reason } => {
                    return Err(mock.fail(ApiError::connect(reason, None)));
                }
                MockBehavior::SendError { reason } => {
                    return Err(mock.fail(ApiError::send(reason, None)));
                }
                MockBehavior::ReceiveError { reason } => {
                    return Err(mock.fail(ApiError::receive(reason, None)));
                }
                MockBehavior::TimeoutError { reason } => {
                    return Err(mock.fail(ApiError::timeout(reason, None)));
                }
                MockBehavior::InternalError { reason } => {
                    return Err(mock.fail(ApiError::new(ApiErrorKind::Internal, None, reason)));
                }
                MockBehavior::Reject { status, reason } => {
                    return Err(mock.fail(ApiError::rejected(status, reason)));
                }
                MockBehavior::Delay(_) | MockBehavior::Pass => {}
            }

            // Falls back to an empty 200 when nothing is queued, the same way
            // a healthy no-content endpoint would answer.
            let (status, headers, body) = match mock.next_response(&request) {
                Some(response) => (response.status, response.headers, response.body),
                None => (200, Vec::new(), Bytes::new()),
            };

            let elapsed = start.elapsed();
            let response = ApiResponse {
                status,
                headers,
                body,
                elapsed,
            };

            let mut state = mock.lock("recording inbound response");
            state.inbound_log.push(response.clone());
            state.last_status = Some(response.status);
            state.state = ApiTransportState::Idle;
            state.elapsed_total += elapsed;
            drop(state);

            Ok(response)
        })
    }
}
