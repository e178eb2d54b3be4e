//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges and address formats
//! - Detect conflicting external roots
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HostConfig;
use crate::discovery::entry::SITE_NAMESPACE;
use crate::discovery::glob::GlobMatcher;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.prefix `{0}` must start with `/`, not end with `/`, and not be `/`")]
    InvalidPrefix(String),

    #[error("{field} `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("server.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("external root name `{0}` must be a non-empty single path segment")]
    InvalidRootName(String),

    #[error("external root name `{0}` is reserved for the site's own functions")]
    ReservedRootName(String),

    #[error("external root `{0}` is configured more than once")]
    DuplicateRoot(String),

    #[error("glob `{glob}` for `{root}` is invalid: {reason}")]
    InvalidGlob {
        root: String,
        glob: String,
        reason: String,
    },
}

pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let prefix = &config.server.prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        errors.push(ValidationError::InvalidPrefix(prefix.clone()));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if let Err(reason) = GlobMatcher::new(&config.site.glob) {
        errors.push(ValidationError::InvalidGlob {
            root: "site".to_string(),
            glob: config.site.glob.clone(),
            reason,
        });
    }

    let mut seen = HashSet::new();
    for external in &config.externals {
        let name = &external.name;
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            errors.push(ValidationError::InvalidRootName(name.clone()));
        } else if name == SITE_NAMESPACE {
            errors.push(ValidationError::ReservedRootName(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateRoot(name.clone()));
        }
        if let Err(reason) = GlobMatcher::new(&external.glob) {
            errors.push(ValidationError::InvalidGlob {
                root: name.clone(),
                glob: external.glob.clone(),
                reason,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
