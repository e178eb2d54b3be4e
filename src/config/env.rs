//! Environment inputs for build-time constants.
//!
//! `.env` and `.env.<environment>` at the site root are read on every build
//! cycle (later files win), then prefixed process variables override them.
//! The merged map becomes the compiler's substitution map.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::schema::HostConfig;

/// Constants the host always sets; callers cannot override them.
pub const RESERVED_DEFINES: [&str; 2] = ["PATH_PREFIX", "PREFIX_PATHS"];

/// Opaque key/value provider consulted once per build cycle.
pub trait EnvProvider: Send + Sync {
    fn load(&self) -> BTreeMap<String, String>;

    /// Files whose changes should trigger a restart.
    fn watched_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Reads dotenv files and prefixed process variables.
#[derive(Debug, Clone)]
pub struct DotenvProvider {
    site_root: PathBuf,
    environment: String,
    prefix: String,
}

impl DotenvProvider {
    pub fn new(
        site_root: impl Into<PathBuf>,
        environment: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            site_root: site_root.into(),
            environment: environment.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(
            config.site_root(),
            config.environment(),
            &config.build.env_prefix,
        )
    }

    /// `.env` then `.env.<environment>`, in load order.
    pub fn env_files(&self) -> Vec<PathBuf> {
        vec![
            self.site_root.join(".env"),
            self.site_root.join(format!(".env.{}", self.environment)),
        ]
    }

    fn read_file(path: &Path) -> Vec<(String, String)> {
        match fs::read_to_string(path) {
            Ok(content) => parse_dotenv(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read env file");
                Vec::new()
            }
        }
    }
}

impl EnvProvider for DotenvProvider {
    fn load(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        for path in self.env_files() {
            vars.extend(Self::read_file(&path));
        }
        if !self.prefix.is_empty() {
            vars.extend(std::env::vars().filter(|(key, _)| key.starts_with(&self.prefix)));
        }
        vars
    }

    fn watched_files(&self) -> Vec<PathBuf> {
        self.env_files()
    }
}

/// A fixed map, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv(pub BTreeMap<String, String>);

impl EnvProvider for StaticEnv {
    fn load(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}

/// Parse `KEY=value` lines. Supports comments, `export`, and quoting.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == b'"' && last == b'"' {
            return value[1..value.len() - 1]
                .replace("\\n", "\n")
                .replace("\\\"", "\"");
        }
        if first == b'\'' && last == b'\'' {
            return value[1..value.len() - 1].to_string();
        }
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(i) => value[..i].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Build the compiler substitution map.
///
/// Every env pair becomes `process.env.<KEY>` → JSON string literal. Extra
/// defines are copied verbatim. The reserved keys are always inserted last.
pub fn build_defines(
    env: &BTreeMap<String, String>,
    extra: &BTreeMap<String, String>,
    path_prefix: &str,
    prefix_paths: bool,
) -> BTreeMap<String, String> {
    let mut defines = BTreeMap::new();

    for (key, value) in env {
        defines.insert(format!("process.env.{}", key), json_string(value));
    }

    for (key, value) in extra {
        if RESERVED_DEFINES.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Ignoring reserved build constant");
            continue;
        }
        defines.insert(key.clone(), value.clone());
    }

    let prefix = if prefix_paths { path_prefix } else { "" };
    defines.insert("PATH_PREFIX".to_string(), json_string(prefix));
    defines.insert("PREFIX_PATHS".to_string(), prefix_paths.to_string());
    defines
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv() {
        let parsed = parse_dotenv(
            "# comment\n\
             A=1\n\
             export B = two\n\
             C=\"quoted # not a comment\"\n\
             D='single'\n\
             E=value # trailing\n\
             =nokey\n\
             garbage\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "quoted # not a comment".to_string()),
                ("D".to_string(), "single".to_string()),
                ("E".to_string(), "value".to_string()),
            ]
        );
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "GREETING=hi\nNAME=base\n").unwrap();
        fs::write(dir.path().join(".env.production"), "NAME=prod\n").unwrap();

        let provider = DotenvProvider::new(dir.path(), "production", "");
        let vars = provider.load();
        assert_eq!(vars.get("GREETING").map(String::as_str), Some("hi"));
        assert_eq!(vars.get("NAME").map(String::as_str), Some("prod"));
        assert_eq!(provider.watched_files().len(), 2);
    }

    #[test]
    fn test_missing_env_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DotenvProvider::new(dir.path(), "development", "");
        assert!(provider.load().is_empty());
    }

    #[test]
    fn test_reserved_defines_cannot_be_overridden() {
        let mut env = BTreeMap::new();
        env.insert("NAME".to_string(), "a \"b\"".to_string());
        let mut extra = BTreeMap::new();
        extra.insert("PATH_PREFIX".to_string(), "\"/hijack\"".to_string());
        extra.insert("PREFIX_PATHS".to_string(), "true".to_string());
        extra.insert("BUILD_ID".to_string(), "\"42\"".to_string());

        let defines = build_defines(&env, &extra, "/blog", false);

        assert_eq!(defines["process.env.NAME"], r#""a \"b\"""#);
        assert_eq!(defines["BUILD_ID"], "\"42\"");
        assert_eq!(defines["PATH_PREFIX"], "\"\"");
        assert_eq!(defines["PREFIX_PATHS"], "false");
    }

    #[test]
    fn test_path_prefix_applies_when_enabled() {
        let defines = build_defines(&BTreeMap::new(), &BTreeMap::new(), "/blog", true);
        assert_eq!(defines["PATH_PREFIX"], "\"/blog\"");
        assert_eq!(defines["PREFIX_PATHS"], "true");
    }
}
