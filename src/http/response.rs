//! Turning a function's response into an HTTP response.

use axum::body::Body;
use axum::response::{IntoResponse, Response};

use crate::executor::FunctionResponse;

impl IntoResponse for FunctionResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ResponseHead;
    use axum::http::StatusCode;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_status_headers_and_body_carry_over() {
        let mut response = FunctionResponse::new();
        let mut headers = BTreeMap::new();
        headers.insert("x-fn".to_string(), "yes".to_string());
        response.send_head(ResponseHead { status: 201, headers });
        response.body = b"made".to_vec();

        let http = response.into_response();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()["x-fn"], "yes");
        let body = axum::body::to_bytes(http.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"made");
    }
}
