//! Wire shapes exchanged with a function process.
//!
//! The request is written to the function's stdin as one JSON document. The
//! function answers on stdout with a single JSON head line followed by the
//! raw body.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExecutionError;
use crate::routing::PathParams;

/// Which body parser produced [`FunctionRequest::body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    None,
    Json,
    Form,
    Text,
    Multipart,
    Raw,
}

/// The request as seen by a function.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionRequest {
    pub method: String,
    /// Path after the routing prefix, without leading `/`.
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub params: PathParams,
    pub body: Value,
    #[serde(rename = "bodyKind")]
    pub body_kind: BodyKind,
}

impl FunctionRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            params: PathParams::new(),
            body: Value::Null,
            body_kind: BodyKind::None,
        }
    }
}

/// First line a function writes to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseHead {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

impl ResponseHead {
    pub fn parse(line: &[u8]) -> Result<Self, ExecutionError> {
        let head: Self = serde_json::from_slice(line)
            .map_err(|e| ExecutionError::Head(e.to_string()))?;
        StatusCode::from_u16(head.status)
            .map_err(|_| ExecutionError::Head(format!("invalid status {}", head.status)))?;
        Ok(head)
    }
}

/// The response being assembled for one invocation.
///
/// `sent` flips once a head has been accepted; after that the executor never
/// replaces the response with an error.
#[derive(Debug)]
pub struct FunctionResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    sent: bool,
}

impl FunctionResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Vec::new(),
            sent: false,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Accept the function's head. Header pairs that are not valid HTTP are
    /// dropped with a warning.
    pub fn send_head(&mut self, head: ResponseHead) {
        self.status = StatusCode::from_u16(head.status).unwrap_or(StatusCode::OK);
        for (name, value) in head.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    self.headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        self.sent = true;
    }

    /// Replace the response with the 500 error page. No-op once sent.
    pub fn send_error(&mut self, source: &std::path::Path, message: &str) -> bool {
        if self.sent {
            return false;
        }
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.headers.clear();
        self.headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = format!(
            "Error when executing function \"{}\":\n\n{}",
            source.display(),
            message
        )
        .into_bytes();
        self.sent = true;
        true
    }
}

impl Default for FunctionResponse {
    fn default() -> Self {
        Self::new()
    }
}
