//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::HostConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// A relative site root resolves against the file's directory.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: HostConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(ConfigError::Io)?,
    };
    let base = if base.is_relative() {
        std::env::current_dir().map_err(ConfigError::Io)?.join(base)
    } else {
        base
    };
    config.resolve_paths(&base);

    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults rooted at the
/// current directory. The flag is `false` when the defaults were used.
///
/// Runs before logging is initialized, so callers report the fallback.
pub fn load_config_or_default(path: &Path) -> Result<(HostConfig, bool), ConfigError> {
    if path.exists() {
        return load_config(path).map(|config| (config, true));
    }

    let mut config = HostConfig::default();
    validate_config(&config).map_err(ConfigError::Validation)?;
    config.resolve_paths(&std::env::current_dir().map_err(ConfigError::Io)?);
    Ok((config, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_site_root_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.toml");
        fs::write(
            &path,
            r#"
            [site]
            root = "my-site"

            [server]
            prefix = "/fn"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.site_root(), dir.path().join("my-site"));
        assert_eq!(config.server.prefix, "/fn");
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.toml");
        fs::write(&path, "[server]\nprefix = \"nope\"\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, from_file) = load_config_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(!from_file);
        assert_eq!(config.server.prefix, HostConfig::default().server.prefix);

        let path = dir.path().join("functions.toml");
        fs::write(&path, "[server]\nprefix = \"/fn\"\n").unwrap();
        let (config, from_file) = load_config_or_default(&path).unwrap();
        assert!(from_file);
        assert_eq!(config.server.prefix, "/fn");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("functions.toml");
        fs::write(&path, "[server\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
