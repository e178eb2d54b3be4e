//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → routing::resolve (against the current table snapshot)
//!     → request.rs (cookies, query, body pre-parse)
//!     → executor (run the function)
//!     → response.rs (status, headers, body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{function_request, parse_cookies, RequestError};
pub use server::{AppState, HttpServer, X_REQUEST_ID};
