//! Compiler service contract.
//!
//! The host treats the compiler as opaque: entry points in, emitted files and
//! diagnostics out, plus an optional continuous watch mode. An entry keyed
//! `K` whose source has extension `E` is emitted at `output_dir/K.E`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CompileError;

/// Entry key (compiled relative path without extension) → source file.
pub type EntryMap = BTreeMap<String, PathBuf>;

/// Called once per compile cycle in watch mode.
pub type OnResult = Box<dyn Fn(CompileResult) + Send + Sync + 'static>;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub output_dir: PathBuf,
    /// Target runtime label.
    pub target: String,
    pub source_maps: bool,
    pub minify: bool,
    /// Build-time constant substitutions, token → replacement.
    pub defines: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file,
            message: message.into(),
        }
    }

    pub fn warning(file: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            file,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {}", file.display(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Outcome of one compile pass.
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
    pub diagnostics: Vec<Diagnostic>,
    pub emitted: Vec<PathBuf>,
}

impl CompileResult {
    pub fn success(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Log every diagnostic at its severity.
    pub fn report(&self) {
        for diagnostic in &self.diagnostics {
            match diagnostic.severity {
                Severity::Error => tracing::error!(diagnostic = %diagnostic, "Compile error"),
                Severity::Warning => tracing::warn!(diagnostic = %diagnostic, "Compile warning"),
            }
        }
    }

    /// Turn a failed result into a [`CompileError`].
    pub fn into_error(self) -> Result<Self, CompileError> {
        if self.success() {
            return Ok(self);
        }
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        Err(CompileError::Failed {
            count: errors.len(),
            summary: errors.join("; "),
        })
    }
}

#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile every entry once.
    async fn compile(&self, entries: &EntryMap, options: &CompileOptions) -> CompileResult;

    /// Compile, then keep recompiling as sources change until stopped.
    async fn watch(
        &self,
        entries: EntryMap,
        options: CompileOptions,
        on_result: OnResult,
    ) -> Result<Box<dyn WatchHandle>, CompileError>;
}

/// A running compiler watch.
#[async_trait]
pub trait WatchHandle: Send {
    /// Stop watching. Returns only once no further compile can start.
    async fn stop(self: Box<Self>) -> Result<(), CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_fail_a_build() {
        let result = CompileResult {
            diagnostics: vec![Diagnostic::warning(None, "unused")],
            emitted: vec![],
        };
        assert!(result.success());
        assert!(result.into_error().is_ok());
    }

    #[test]
    fn test_errors_are_summarized() {
        let result = CompileResult {
            diagnostics: vec![
                Diagnostic::error(Some(PathBuf::from("a.js")), "boom"),
                Diagnostic::warning(None, "meh"),
                Diagnostic::error(None, "bang"),
            ],
            emitted: vec![],
        };
        assert!(!result.success());
        match result.into_error() {
            Err(CompileError::Failed { count, summary }) => {
                assert_eq!(count, 2);
                assert_eq!(summary, "a.js: boom; bang");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
