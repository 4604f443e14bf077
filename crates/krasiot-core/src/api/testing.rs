//! In-memory transport for gateway and client tests.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

/// What the mock saw for one dispatch
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

/// Answers every request through a closure and records what was sent.
/// Each send yields once so concurrent callers interleave.
pub struct MockTransport {
    handler: Box<Handler>,
    sent: Mutex<Vec<SentRequest>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<SentRequest> {
        self.sent().into_iter().filter(|r| r.path == path).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.sent.lock().unwrap().push(SentRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            bearer: request.bearer.clone(),
            body: request.body.clone(),
        });
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

pub fn respond(status: u16, body: &str) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::new(StatusCode::from_u16(status).unwrap(), body))
}

pub fn tokens_body(access: &str, refresh: &str) -> String {
    format!(
        r#"{{"access_token":"{}","refresh_token":"{}","token_type":"Bearer","expires_in":3600}}"#,
        access, refresh
    )
}

pub fn user_body(email: &str) -> String {
    format!(
        r#"{{"user_uid":"u-1","email":"{}","firstname":"Ann","lastname":"Lee","role":"user"}}"#,
        email
    )
}
