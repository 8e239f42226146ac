//! Bearer-token client for the platform backend: every call is
//! `<base_url>/<api_route>` with an `Authorization: Bearer <token>` header,
//! plus an in-memory mock transport for fully deterministic tests.

#![allow(dead_code)]

pub mod adapter;
pub mod mock;

pub use reqwest::Method;

pub use adapter::{
    API_BASE_URL, ApiBytes, ApiClient, ApiError, ApiErrorKind, ApiFuture, ApiRequest, ApiResponse,
    ApiResult, ApiTransport, ApiTransportState, ReqwestTransport,
};
pub use mock::{MockApiSnapshot, MockApiTransport, MockBehavior, MockBehaviorPlan, MockResponse};
