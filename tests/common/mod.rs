//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use function_router::config::env::StaticEnv;
use function_router::{BuildOrchestrator, HostConfig, StageCompiler};
use tempfile::TempDir;

/// Writes a `text/plain` head, then the greeting.
pub const HELLO: &str = r#"echo '{"status":200,"headers":{"content-type":"text/plain"}}'
printf 'hello'"#;

/// Echoes the request JSON it receives on stdin.
pub const ECHO: &str = r#"echo '{"status":200,"headers":{"content-type":"application/json"}}'
cat"#;

/// Index function for the prefix root.
pub const INDEX: &str = r#"echo '{"status":200}'
printf 'index'"#;

/// A temporary site tree with functions under `src/api`.
pub struct Site {
    dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/api")).unwrap();
        Self { dir }
    }

    /// The standard layout: `index`, `hello` and `users/[id]`.
    pub fn standard() -> Self {
        let site = Self::new();
        site.function("index.sh", INDEX);
        site.function("hello.sh", HELLO);
        site.function("users/[id].sh", ECHO);
        site
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn api(&self) -> PathBuf {
        self.root().join("src/api")
    }

    /// Write an executable `#!/bin/sh` function under `src/api`.
    pub fn function(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.api().join(relative);
        self.write_script(&path, body);
        path
    }

    /// Write an executable function under an arbitrary directory of the site.
    pub fn function_in(&self, dir: &str, relative: &str, body: &str) -> PathBuf {
        let path = self.root().join(dir).join(relative);
        self.write_script(&path, body);
        path
    }

    pub fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn write_script(&self, path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    pub fn config(&self) -> HostConfig {
        let mut config = HostConfig::default();
        config.site.root = self.root().to_path_buf();
        config.build.debounce_ms = 20;
        config
    }

    pub fn orchestrator(&self, config: HostConfig) -> Arc<BuildOrchestrator> {
        Arc::new(BuildOrchestrator::new(
            Arc::new(config),
            Arc::new(StageCompiler::new()),
            Arc::new(StaticEnv::default()),
        ))
    }
}

/// Poll `check` until it holds, panicking after about five seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached in time");
}
