//! Request pre-parsing.
//!
//! # Responsibilities
//! - Parse the `Cookie` header into a key/value map
//! - Parse the query string
//! - Parse the body by `Content-Type` (JSON, url-encoded, text, multipart, raw)
//! - Assemble the [`FunctionRequest`] handed to a function
//!
//! # Design Decisions
//! - Malformed JSON and broken multipart bodies are rejected with 400 before
//!   any function runs
//! - Bodies over the configured limit are rejected with 413

use std::collections::BTreeMap;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, request::Parts, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::executor::{BodyKind, FunctionRequest};
use crate::routing::PathParams;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid multipart body: {0}")]
    Multipart(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match self {
            RequestError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Build the function-facing request. `path` is the part after the prefix.
pub async fn function_request(
    request: Request<Body>,
    path: &str,
    params: PathParams,
    limit: usize,
) -> Result<FunctionRequest, RequestError> {
    let (parts, body) = request.into_parts();

    let mut out = FunctionRequest::new(parts.method.as_str(), path.trim_matches('/'));
    out.query = parse_query(parts.uri.query());
    out.headers = header_map(&parts.headers);
    out.cookies = parse_cookies(&parts.headers);
    out.params = params;

    let (kind, value) = parse_body(parts, body, limit).await?;
    out.body_kind = kind;
    out.body = value;
    Ok(out)
}

pub fn parse_query(query: Option<&str>) -> BTreeMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// `a=b; c=d` across every `Cookie` header. Later duplicates win.
pub fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            cookies.insert(name.to_string(), value.to_string());
        }
    }
    cookies
}

/// Header names are lowercase; repeated headers are joined with `, `.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match out.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                out.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }
    out
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    Some(mime)
}

async fn parse_body(
    parts: Parts,
    body: Body,
    limit: usize,
) -> Result<(BodyKind, Value), RequestError> {
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(RequestError::TooLarge { limit });
    }

    let mime = content_type(&parts.headers);
    if mime.as_deref() == Some("multipart/form-data") {
        let request = Request::from_parts(parts, body);
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| RequestError::Multipart(e.body_text()))?;
        return Ok((BodyKind::Multipart, parse_multipart(multipart).await?));
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| RequestError::Body(e.to_string()))?;
    if bytes.is_empty() {
        return Ok((BodyKind::None, Value::Null));
    }

    let parsed = match mime.as_deref() {
        Some(m) if m == "application/json" || m.ends_with("+json") => {
            (BodyKind::Json, serde_json::from_slice(&bytes)?)
        }
        Some("application/x-www-form-urlencoded") => {
            let form: Map<String, Value> = url::form_urlencoded::parse(&bytes)
                .into_owned()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            (BodyKind::Form, Value::Object(form))
        }
        Some(m) if m.starts_with("text/") => (
            BodyKind::Text,
            Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        ),
        _ => (
            BodyKind::Raw,
            Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        ),
    };
    Ok(parsed)
}

/// Text fields become strings; file parts are described, not inlined.
async fn parse_multipart(mut multipart: Multipart) -> Result<Value, RequestError> {
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RequestError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| RequestError::Multipart(e.body_text()))?;

        let value = match file_name {
            Some(file_name) => serde_json::json!({
                "filename": file_name,
                "contentType": content_type,
                "size": data.len(),
            }),
            None => Value::String(String::from_utf8_lossy(&data).into_owned()),
        };
        fields.insert(name, value);
    }
    Ok(Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/api/x?a=1&b=two+words");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn parse(content_type: Option<&str>, body: &str) -> Result<FunctionRequest, RequestError> {
        function_request(request(content_type, body), "/x/", PathParams::new(), 1024).await
    }

    #[test]
    fn test_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=b; c=\"d\""));
        headers.append(header::COOKIE, HeaderValue::from_static("e=f=g;broken; a=z"));
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies["a"], "z");
        assert_eq!(cookies["c"], "d");
        assert_eq!(cookies["e"], "f=g");
        assert!(!cookies.contains_key("broken"));
    }

    #[tokio::test]
    async fn test_json_body_and_query() {
        let req = parse(Some("application/json; charset=utf-8"), r#"{"n":1}"#).await.unwrap();
        assert_eq!(req.body_kind, BodyKind::Json);
        assert_eq!(req.body["n"], 1);
        assert_eq!(req.path, "x");
        assert_eq!(req.method, "POST");
        assert_eq!(req.query["a"], "1");
        assert_eq!(req.query["b"], "two words");
    }

    #[tokio::test]
    async fn test_bad_json_is_rejected() {
        let err = parse(Some("application/json"), "{nope").await.unwrap_err();
        assert!(matches!(err, RequestError::Json(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_form_text_raw_and_empty() {
        let form = parse(Some("application/x-www-form-urlencoded"), "x=1&y=%20z").await.unwrap();
        assert_eq!(form.body_kind, BodyKind::Form);
        assert_eq!(form.body, serde_json::json!({"x": "1", "y": " z"}));

        let text = parse(Some("text/plain"), "hello").await.unwrap();
        assert_eq!(text.body_kind, BodyKind::Text);
        assert_eq!(text.body, "hello");

        let raw = parse(Some("application/octet-stream"), "bytes").await.unwrap();
        assert_eq!(raw.body_kind, BodyKind::Raw);

        let empty = parse(None, "").await.unwrap();
        assert_eq!(empty.body_kind, BodyKind::None);
        assert!(empty.body.is_null());
    }

    #[tokio::test]
    async fn test_multipart_fields() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            hi\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            12345\r\n\
            --XX--\r\n";
        let req = parse(Some("multipart/form-data; boundary=XX"), body).await.unwrap();
        assert_eq!(req.body_kind, BodyKind::Multipart);
        assert_eq!(req.body["title"], "hi");
        assert_eq!(req.body["upload"]["filename"], "a.txt");
        assert_eq!(req.body["upload"]["size"], 5);
    }

    #[tokio::test]
    async fn test_declared_oversize_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/x")
            .header(header::CONTENT_LENGTH, "4096")
            .body(Body::from("x"))
            .unwrap();
        let err = function_request(req, "x", PathParams::new(), 1024).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
