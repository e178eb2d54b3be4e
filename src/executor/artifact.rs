//! Compiled artifact loading.
//!
//! Artifacts are re-read on every invocation so a rebuild takes effect on the
//! next request. Nothing is cached between calls.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::discovery::RouteEntry;
use crate::error::LoadError;

/// How to start a function process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocable {
    pub program: String,
    pub args: Vec<String>,
    pub artifact: PathBuf,
}

impl Invocable {
    /// Human-readable command line for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Load the artifact for `entry` and resolve what to run.
///
/// An interpreter line (`#!`) is the handler when present; otherwise the
/// artifact itself has to be executable.
pub fn load(entry: &RouteEntry) -> Result<Invocable, LoadError> {
    let artifact = &entry.compiled_absolute_path;
    let file = File::open(artifact).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::Missing {
            origin: entry.original_source_path.clone(),
            artifact: artifact.clone(),
        },
        _ => LoadError::Io {
            artifact: artifact.clone(),
            source,
        },
    })?;

    let mut first_line = Vec::new();
    BufReader::new(file)
        .take(4096)
        .read_until(b'\n', &mut first_line)
        .map_err(|source| LoadError::Io {
            artifact: artifact.clone(),
            source,
        })?;

    if let Some(invocable) = parse_interpreter(&first_line, artifact) {
        return Ok(invocable);
    }

    if is_executable(artifact).map_err(|source| LoadError::Io {
        artifact: artifact.clone(),
        source,
    })? {
        return Ok(Invocable {
            program: artifact.display().to_string(),
            args: Vec::new(),
            artifact: artifact.clone(),
        });
    }

    Err(LoadError::NotInvocable {
        origin: entry.original_source_path.clone(),
        artifact: artifact.clone(),
    })
}

/// Parse `#!/usr/bin/env node --flag` into an invocable that receives the
/// artifact path as its last argument.
fn parse_interpreter(line: &[u8], artifact: &Path) -> Option<Invocable> {
    let line = std::str::from_utf8(line.strip_prefix(b"#!")?).ok()?;
    let mut parts = line.split_whitespace();
    let program = parts.next()?.to_string();
    let mut args: Vec<String> = parts.map(str::to_string).collect();
    args.push(artifact.display().to_string());
    Some(Invocable {
        program,
        args,
        artifact: artifact.to_path_buf(),
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    Ok(std::fs::metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> std::io::Result<bool> {
    Ok(path.extension().is_some_and(|ext| ext == "exe" || ext == "bat" || ext == "cmd"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceRoot;

    fn entry(dir: &Path, file: &str, content: &str, mode: u32) -> RouteEntry {
        let root = SourceRoot::site(dir.join("src"), "**/*");
        let entry = RouteEntry::from_source(&root, Path::new(file), &dir.join("out"));
        std::fs::create_dir_all(entry.compiled_absolute_path.parent().unwrap()).unwrap();
        std::fs::write(&entry.compiled_absolute_path, content).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &entry.compiled_absolute_path,
                std::fs::Permissions::from_mode(mode),
            )
            .unwrap();
        }
        let _ = mode;
        entry
    }

    #[test]
    fn test_interpreter_line_is_the_handler() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry(dir.path(), "hello.js", "#!/usr/bin/env node\nconsole.log(1)\n", 0o644);
        let invocable = load(&entry).unwrap();
        assert_eq!(invocable.program, "/usr/bin/env");
        assert_eq!(
            invocable.args,
            vec!["node".to_string(), entry.compiled_absolute_path.display().to_string()]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_artifact_runs_directly() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry(dir.path(), "bin.sh", "echo hi\n", 0o755);
        let invocable = load(&entry).unwrap();
        assert_eq!(invocable.program, entry.compiled_absolute_path.display().to_string());
        assert!(invocable.args.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_not_invocable_names_source() {
        let dir = tempfile::tempdir().unwrap();
        let entry = entry(dir.path(), "data.js", "module.exports = 1\n", 0o644);
        let err = load(&entry).unwrap_err();
        assert!(matches!(err, LoadError::NotInvocable { .. }));
        assert!(err.to_string().contains(&entry.original_source_path.display().to_string()));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let root = SourceRoot::site(dir.path().join("src"), "**/*");
        let entry = RouteEntry::from_source(&root, Path::new("gone.js"), &dir.path().join("out"));
        assert!(matches!(load(&entry), Err(LoadError::Missing { .. })));
    }
}
