//! Function execution.
//!
//! # Data Flow
//! ```text
//! RouteMatch + FunctionRequest
//!     → artifact.rs (re-read compiled file, resolve interpreter or exec bit)
//!     → invoke.rs (spawn, request JSON on stdin)
//!     → protocol.rs (head line + body from stdout)
//!     → FunctionResponse
//! ```
//!
//! # Design Decisions
//! - Artifacts are never cached; every request sees the latest build
//! - Single attempt, no timeout
//! - A response whose head was sent is never overwritten by an error page

pub mod artifact;
pub mod invoke;
pub mod protocol;

pub use artifact::Invocable;
pub use invoke::FunctionExecutor;
pub use protocol::{BodyKind, FunctionRequest, FunctionResponse, ResponseHead};
