//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve site root)
//!     → validation.rs (semantic checks)
//!     → HostConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Every build cycle:
//!     env.rs reads .env / .env.<environment> + prefixed process vars
//!     → build-time constants for the compiler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; env files are re-read per cycle
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{DotenvProvider, EnvProvider};
pub use loader::{load_config, load_config_or_default, ConfigError};
pub use schema::HostConfig;
pub use schema::{BuildConfig, ExternalRootConfig, ObservabilityConfig, ServerConfig, SiteConfig};
