//! HTTP transport collaborator.
//!
//! # Data Flow
//! ```text
//! adapter builds HttpRequest
//!     → Transport::send (injected; client.rs binds it to reqwest)
//!     → status.rs classifies the outcome:
//!         no response → NetworkError
//!         401         → CredentialError
//!         other !2xx  → RemoteError(backend message)
//!     → adapter decodes the JSON body
//! ```

pub mod client;
pub mod status;

use async_trait::async_trait;
use thiserror::Error;

pub use client::ReqwestTransport;
pub use status::{classify, decode_json, parse_json_body};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing request. Headers are sent verbatim.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Failure below the HTTP layer: nothing came back.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// `(method, url, headers, body) -> {status, body}`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
