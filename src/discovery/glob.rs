//! Glob expressions for source roots, and the directory walk they filter.
//!
//! Supported syntax: `**` (any number of segments), `*` (within a segment),
//! `?` (one character) and `{a,b}` alternation. Brackets are literal so that
//! `[id].js` style file names can be matched verbatim.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Directory names that are never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

/// A compiled glob matched against `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    glob: String,
    regex: Regex,
}

impl GlobMatcher {
    pub fn new(glob: &str) -> Result<Self, String> {
        let mut pattern = String::from("^");
        let chars: Vec<char> = glob.chars().collect();
        let mut in_group = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '*' if chars.get(i + 1) == Some(&'*') => {
                    if chars.get(i + 2) == Some(&'/') {
                        pattern.push_str("(?:.*/)?");
                        i += 3;
                    } else {
                        pattern.push_str(".*");
                        i += 2;
                    }
                    continue;
                }
                '*' => pattern.push_str("[^/]*"),
                '?' => pattern.push_str("[^/]"),
                '{' if !in_group => {
                    in_group = true;
                    pattern.push_str("(?:");
                }
                '{' => return Err("nested `{` groups are not supported".to_string()),
                '}' if in_group => {
                    in_group = false;
                    pattern.push(')');
                }
                ',' if in_group => pattern.push('|'),
                other => pattern.push_str(&regex::escape(&other.to_string())),
            }
            i += 1;
        }

        if in_group {
            return Err("unterminated `{` group".to_string());
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }

    pub fn is_match(&self, relative: &str) -> bool {
        self.regex.is_match(relative)
    }

    /// Match a path relative to some base directory.
    pub fn matches_path(&self, relative: &Path) -> bool {
        let slashed = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.is_match(&slashed)
    }
}

/// Whether a relative path passes the same filters [`walk_files`] applies.
pub fn is_visible(relative: &Path) -> bool {
    relative.components().all(|component| {
        let name = component.as_os_str().to_string_lossy();
        !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
    })
}

/// Recursively list regular files under `base`, relative to it, sorted.
///
/// A missing `base` yields an empty list.
pub fn walk_files(base: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    match fs::metadata(base) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    }
    walk_dir(base, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(base: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(base.join(relative))? {
        let entry = entry?;
        let name = entry.file_name();
        let child = relative.join(&name);
        if !is_visible(Path::new(&name)) {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(base, &child, files)?;
        } else if file_type.is_file() || file_type.is_symlink() {
            files.push(child);
        }
    }
    Ok(())
}
