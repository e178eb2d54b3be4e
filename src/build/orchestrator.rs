//! Build orchestration.
//!
//! # Responsibilities
//! - Derive source roots and compiler options for a build cycle
//! - Turn a route table into compiler entry points
//! - Run one-shot builds and persist the manifest
//!
//! # Design Decisions
//! - Options are rebuilt every cycle so env file changes take effect
//! - One-shot compile failures are returned as hard errors, never retried

use std::path::PathBuf;
use std::sync::Arc;

use crate::build::compiler::{CompileOptions, CompileResult, Compiler, EntryMap};
use crate::build::manifest;
use crate::config::env::{build_defines, EnvProvider};
use crate::config::HostConfig;
use crate::discovery::{self, RouteTable, SourceRoot};
use crate::error::BuildError;
use crate::observability::metrics;

/// Compiler entry points for a table, keyed by entry key.
pub fn entry_map(table: &RouteTable) -> EntryMap {
    table
        .iter()
        .map(|entry| (entry.entry_key(), entry.original_source_path.clone()))
        .collect()
}

/// Drives discovery and compilation for one site.
pub struct BuildOrchestrator {
    config: Arc<HostConfig>,
    compiler: Arc<dyn Compiler>,
    env: Arc<dyn EnvProvider>,
}

impl BuildOrchestrator {
    pub fn new(config: Arc<HostConfig>, compiler: Arc<dyn Compiler>, env: Arc<dyn EnvProvider>) -> Self {
        Self { config, compiler, env }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    pub fn source_roots(&self) -> Vec<SourceRoot> {
        self.config.source_roots()
    }

    /// Env files that should restart a watch session when touched.
    pub fn env_files(&self) -> Vec<PathBuf> {
        self.env.watched_files()
    }

    pub fn manifest_path(&self) -> PathBuf {
        manifest::manifest_path(&self.config.cache_dir())
    }

    /// Compiler options for the current cycle, with fresh env constants.
    pub fn compile_options(&self) -> CompileOptions {
        let build = &self.config.build;
        CompileOptions {
            output_dir: self.config.output_dir(),
            target: build.target.clone(),
            source_maps: build.source_maps,
            minify: build.minify,
            defines: build_defines(
                &self.env.load(),
                &build.defines,
                &build.path_prefix,
                build.prefix_paths,
            ),
        }
    }

    /// Discover functions. Per-root failures are logged and skipped.
    pub async fn discover(&self) -> RouteTable {
        let result = discovery::discover(&self.source_roots(), &self.config.output_dir()).await;
        for error in &result.errors {
            tracing::warn!(error = %error, "Function discovery degraded");
        }
        metrics::record_route_count(result.table.len());
        result.table
    }

    /// Compile the table once and persist the manifest.
    pub async fn run_once(&self, table: &RouteTable) -> Result<CompileResult, BuildError> {
        let entries = entry_map(table);
        let options = self.compile_options();

        tracing::info!(
            entries = entries.len(),
            output_dir = %options.output_dir.display(),
            "Compiling functions"
        );

        let result = self.compiler.compile(&entries, &options).await;
        result.report();
        let result = match result.into_error() {
            Ok(result) => result,
            Err(e) => {
                metrics::record_build("failure");
                return Err(e.into());
            }
        };

        let path = self.write_manifest(table)?;
        metrics::record_build("success");
        tracing::info!(
            routes = table.len(),
            emitted = result.emitted.len(),
            manifest = %path.display(),
            "Functions compiled"
        );
        Ok(result)
    }

    pub fn write_manifest(&self, table: &RouteTable) -> Result<PathBuf, BuildError> {
        manifest::write_manifest(&self.config.cache_dir(), table)
    }
}
