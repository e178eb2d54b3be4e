//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::SourceRoot;

/// Default glob for function modules.
pub const DEFAULT_FUNCTION_GLOB: &str = "**/*.{js,mjs,cjs,ts,sh,py}";

/// Root configuration for the function host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// The site whose functions take precedence.
    pub site: SiteConfig,

    /// External (plugin) function roots, in precedence order.
    #[serde(rename = "external")]
    pub externals: Vec<ExternalRootConfig>,

    /// Build and watch settings.
    pub build: BuildConfig,

    /// HTTP surface settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl HostConfig {
    /// Make the site root absolute. Other paths are resolved against it.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.site.root.is_relative() {
            self.site.root = base
                .join(&self.site.root)
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect();
        }
    }

    pub fn site_root(&self) -> &Path {
        &self.site.root
    }

    pub fn functions_dir(&self) -> PathBuf {
        self.site.root.join(&self.site.functions_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.site.root.join(&self.build.output_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.site.root.join(&self.build.cache_dir)
    }

    /// Environment name used to pick the `.env.<name>` file.
    pub fn environment(&self) -> &str {
        self.build.environment.as_deref().unwrap_or("development")
    }

    /// Source roots for one build cycle: site first, then externals.
    pub fn source_roots(&self) -> Vec<SourceRoot> {
        let mut roots = vec![SourceRoot::site(self.functions_dir(), &self.site.glob)];
        roots.extend(self.externals.iter().map(|external| {
            SourceRoot::external(
                &external.name,
                self.site.root.join(&external.dir),
                &external.glob,
            )
        }));
        roots
    }
}

/// The site root and where its functions live.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root directory. Relative paths resolve against the config file.
    pub root: PathBuf,

    /// Functions directory, relative to the site root.
    pub functions_dir: PathBuf,

    /// Glob selecting function modules under `functions_dir`.
    pub glob: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            functions_dir: PathBuf::from("src/api"),
            glob: DEFAULT_FUNCTION_GLOB.to_string(),
        }
    }
}

/// An external function root contributed by a plugin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalRootConfig {
    /// Root identifier; also namespaces compiled output.
    pub name: String,

    /// Functions directory, relative to the site root.
    pub dir: PathBuf,

    #[serde(default = "default_glob")]
    pub glob: String,
}

fn default_glob() -> String {
    DEFAULT_FUNCTION_GLOB.to_string()
}

/// Build configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiled artifacts, relative to the site root.
    pub output_dir: PathBuf,

    /// Manifest location, relative to the site root.
    pub cache_dir: PathBuf,

    /// Target runtime label passed to the compiler.
    pub target: String,

    pub source_maps: bool,

    pub minify: bool,

    /// Environment name (`development`, `production`, ...). Defaults per mode.
    pub environment: Option<String>,

    /// Process environment variables with this prefix become build-time constants.
    pub env_prefix: String,

    /// Extra build-time constants. Reserved keys are ignored.
    pub defines: BTreeMap<String, String>,

    /// Site path prefix exposed as `PATH_PREFIX`.
    pub path_prefix: String,

    /// Whether `path_prefix` is applied (`PREFIX_PATHS`).
    pub prefix_paths: bool,

    /// Quiet period before a watch-triggered restart, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".cache/functions"),
            cache_dir: PathBuf::from(".cache"),
            target: "native".to_string(),
            source_maps: true,
            minify: false,
            environment: None,
            env_prefix: "FUNCTION_".to_string(),
            defines: BTreeMap::new(),
            path_prefix: String::new(),
            prefix_paths: false,
            debounce_ms: 100,
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Routing prefix intercepted by the function router.
    pub prefix: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            prefix: "/api".to_string(),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceRootId;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: HostConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.prefix, "/api");
        assert_eq!(config.site.functions_dir, PathBuf::from("src/api"));
        assert_eq!(config.environment(), "development");
        assert!(config.externals.is_empty());
    }

    #[test]
    fn test_source_roots_put_site_first() {
        let mut config: HostConfig = toml::from_str(
            r#"
            [site]
            root = "site"

            [[external]]
            name = "plugin-a"
            dir = "plugins/a/api"

            [[external]]
            name = "plugin-b"
            dir = "/abs/b"
            glob = "**/*.sh"
            "#,
        )
        .unwrap();
        config.resolve_paths(Path::new("/work"));

        let roots = config.source_roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0].id, SourceRootId::Site);
        assert_eq!(roots[0].base_dir, PathBuf::from("/work/site/src/api"));
        assert_eq!(roots[1].id, SourceRootId::External("plugin-a".into()));
        assert_eq!(roots[1].base_dir, PathBuf::from("/work/site/plugins/a/api"));
        assert_eq!(roots[1].glob, DEFAULT_FUNCTION_GLOB);
        assert_eq!(roots[2].base_dir, PathBuf::from("/abs/b"));
        assert_eq!(roots[2].glob, "**/*.sh");
        assert_eq!(config.output_dir(), PathBuf::from("/work/site/.cache/functions"));
    }
}
