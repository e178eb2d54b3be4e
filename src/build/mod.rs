//! Function compilation.
//!
//! # Data Flow
//! ```text
//! discovery ──▶ RouteTable ──▶ entry_map ──▶ Compiler ──▶ output_dir/<key>.<ext>
//!                   │                                          │
//!                   └──────────── manifest.json ◀──────────────┘
//! ```
//!
//! # Design Decisions
//! - The compiler sits behind a trait so the session logic can be tested
//!   without touching the filesystem
//! - A watch session restarts the compiler only on structural changes
//!   (function added, removed or renamed, env file changed)
//! - Content edits are rebuilt by the running compiler watch

pub mod compiler;
pub mod manifest;
pub mod orchestrator;
pub mod session;
pub mod stage;

pub use compiler::{CompileOptions, CompileResult, Compiler, Diagnostic, Severity, WatchHandle};
pub use orchestrator::BuildOrchestrator;
pub use session::{SessionState, WatchSession};
pub use stage::StageCompiler;
