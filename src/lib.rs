//! Function router library.
//!
//! Discovers serverless-style function files under a site and its external
//! roots, compiles them, and serves them under an HTTP prefix.

pub mod build;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use build::{BuildOrchestrator, StageCompiler, WatchSession};
pub use config::HostConfig;
pub use executor::FunctionExecutor;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::SharedRouteTable;
