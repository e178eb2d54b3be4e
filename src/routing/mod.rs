//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Path under the routing prefix
//!     → router.rs (exact lookup)
//!     → matcher.rs (dynamic patterns, in table order)
//!     → Return: RouteMatch { entry, params } or no-match
//!
//! Table publication (watch session):
//!     RouteTable (freshly discovered)
//!     → table.rs (atomic swap)
//!     → readers keep their snapshot until the request ends
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at table construction, immutable afterwards
//! - Deterministic: same table and path always resolve the same way
//! - Exact before dynamic; among dynamic, first match wins

pub mod matcher;
pub mod router;
pub mod table;

pub use matcher::{PathParams, RoutePattern};
pub use router::{resolve, RouteMatch};
pub use table::SharedRouteTable;
