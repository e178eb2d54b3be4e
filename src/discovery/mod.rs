//! Function discovery subsystem.
//!
//! # Data Flow
//! ```text
//! SourceRoot[] (site + external, from config)
//!     → glob.rs (walk base dir, filter by glob)
//!     → entry.rs (relative path → route, compiled paths, pattern)
//!     → scan.rs (fold roots: site first, first route wins)
//!     → RouteTable
//! ```
//!
//! # Design Decisions
//! - Roots scan concurrently, fold sequentially in precedence order
//! - A failing root is reported and skipped, never fatal
//! - Files are sorted within a root so unchanged trees give identical tables

pub mod entry;
pub mod glob;
pub mod scan;

pub use entry::{RouteEntry, RouteTable, SourceRoot, SourceRootId};
pub use scan::{discover, Discovery};
