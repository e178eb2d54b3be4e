//! Error taxonomy for discovery, builds, restarts and function invocation.
//!
//! Only [`CompileError`] in one-shot builds and [`RestartError`] are meant to
//! end the process; everything else is reported and degrades locally.

use std::path::PathBuf;

use thiserror::Error;

/// A single source root could not be scanned. Other roots are unaffected.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("source root `{root}` at {dir} could not be read: {source}")]
    Io {
        root: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob `{glob}` for source root `{root}`: {reason}")]
    Glob {
        root: String,
        glob: String,
        reason: String,
    },

    #[error("discovery task for source root `{root}` failed: {reason}")]
    Task { root: String, reason: String },
}

/// Errors reported by a compiler service.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation failed with {count} error(s): {summary}")]
    Failed { count: usize, summary: String },

    #[error("compiler watch could not be started: {0}")]
    Watch(String),

    #[error("compiler watch did not stop cleanly: {0}")]
    Stop(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a one-shot build cycle.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The compiled artifact for a route could not be turned into something runnable.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("compiled function for \"{origin}\" not found at {artifact}")]
    Missing { origin: PathBuf, artifact: PathBuf },

    #[error(
        "function \"{origin}\" does not provide an invocable handler: \
         {artifact} has no interpreter line and is not executable"
    )]
    NotInvocable { origin: PathBuf, artifact: PathBuf },

    #[error("failed to read compiled function {artifact}: {source}")]
    Io {
        artifact: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while a function runs.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("function exited with {status}{stderr}")]
    Exit { status: String, stderr: String },

    #[error("malformed response head: {0}")]
    Head(String),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error while talking to function: {0}")]
    Io(#[from] std::io::Error),
}

/// The watch session could not swap compiler instances. Fatal to the session.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("failed to stop the running compiler watch: {0}")]
    Stop(#[source] CompileError),

    #[error("failed to start a compiler watch: {0}")]
    Start(#[source] CompileError),

    #[error("filesystem subscription failed: {0}")]
    Subscription(#[from] notify::Error),
}
