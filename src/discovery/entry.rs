//! Route table data model.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::routing::matcher::RoutePattern;

/// Output directory segment for the site's own artifacts. External roots
/// may not use it as their name.
pub const SITE_NAMESPACE: &str = "site";

/// Identity of the root a function was discovered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum SourceRootId {
    /// The site's own functions directory. Always takes precedence.
    Site,
    /// A named external root (plugin), in configuration order.
    External(String),
}

impl SourceRootId {
    pub fn is_site(&self) -> bool {
        matches!(self, SourceRootId::Site)
    }
}

impl fmt::Display for SourceRootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRootId::Site => write!(f, "{}", SITE_NAMESPACE),
            SourceRootId::External(name) => write!(f, "{}", name),
        }
    }
}

/// A configured scan root. Immutable for one build cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub id: SourceRootId,
    pub base_dir: PathBuf,
    pub glob: String,
}

impl SourceRoot {
    pub fn site(base_dir: impl Into<PathBuf>, glob: impl Into<String>) -> Self {
        Self {
            id: SourceRootId::Site,
            base_dir: base_dir.into(),
            glob: glob.into(),
        }
    }

    pub fn external(
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        glob: impl Into<String>,
    ) -> Self {
        Self {
            id: SourceRootId::External(name.into()),
            base_dir: base_dir.into(),
            glob: glob.into(),
        }
    }
}

/// One discovered function and its route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    /// Normalized URL path, without leading or trailing slash.
    pub route: String,

    pub source_root: SourceRootId,

    /// Source path relative to its root, `/`-separated.
    pub relative_path: String,

    pub original_source_path: PathBuf,

    pub compiled_relative_path: PathBuf,

    pub compiled_absolute_path: PathBuf,

    /// Present only when the route has dynamic segments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_path: Option<String>,

    #[serde(skip)]
    pattern: Option<RoutePattern>,
}

impl RouteEntry {
    /// Build an entry for `relative` (a path under `root.base_dir`).
    pub fn from_source(root: &SourceRoot, relative: &Path, output_dir: &Path) -> Self {
        let relative_path = to_slash_path(relative);
        let (stem, extension) = split_extension(&relative_path);

        let mut segments: Vec<String> = stem.split('/').map(normalize_segment).collect();
        if segments.last().map(String::as_str) == Some("index") {
            segments.pop();
        }
        let route = segments.join("/").trim_matches('/').to_string();

        let key = format!("{}/{}", root.id, stem);
        let compiled_relative_path = match extension {
            Some(ext) => PathBuf::from(format!("{}.{}", key, ext)),
            None => PathBuf::from(&key),
        };

        let mut entry = Self {
            route,
            source_root: root.id.clone(),
            original_source_path: root.base_dir.join(relative),
            compiled_absolute_path: output_dir.join(&compiled_relative_path),
            compiled_relative_path,
            relative_path,
            match_path: None,
            pattern: None,
        };
        if RoutePattern::is_dynamic(&entry.route) {
            entry.match_path = Some(entry.route.clone());
        }
        entry.compile_pattern();
        entry
    }

    /// Compiler entry point key: the compiled relative path without extension.
    pub fn entry_key(&self) -> String {
        let path = to_slash_path(&self.compiled_relative_path);
        split_extension(&path).0.to_string()
    }

    /// The compiled matcher, present only for dynamic routes.
    pub fn pattern(&self) -> Option<&RoutePattern> {
        self.pattern.as_ref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.match_path.is_some()
    }

    fn compile_pattern(&mut self) {
        self.pattern = match &self.match_path {
            Some(path) => match RoutePattern::compile(path) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(route = %path, error = %e, "Dynamic route could not be compiled, matching exactly");
                    None
                }
            },
            None => None,
        };
    }
}

impl PartialEq for RouteEntry {
    fn eq(&self, other: &Self) -> bool {
        self.route == other.route
            && self.source_root == other.source_root
            && self.relative_path == other.relative_path
            && self.original_source_path == other.original_source_path
            && self.compiled_relative_path == other.compiled_relative_path
            && self.compiled_absolute_path == other.compiled_absolute_path
            && self.match_path == other.match_path
    }
}

impl Eq for RouteEntry {}

/// Ordered, route-unique list of entries.
///
/// Exact lookups ignore order; dynamic matching walks entries in order and
/// the first matching pattern wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<RouteEntry>")]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless its route is already taken.
    ///
    /// Returns false when the entry was discarded.
    pub fn insert(&mut self, entry: RouteEntry) -> bool {
        if self.get(&entry.route).is_some() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Entry with exactly this route.
    pub fn get(&self, route: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.route == route)
    }

    /// Whether some entry was compiled from this source file.
    pub fn contains_source(&self, path: &Path) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.original_source_path == path)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn routes(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.route.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<RouteEntry>> for RouteTable {
    fn from(entries: Vec<RouteEntry>) -> Self {
        let mut table = RouteTable::new();
        for mut entry in entries {
            entry.compile_pattern();
            table.insert(entry);
        }
        table
    }
}

impl Serialize for RouteTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// `[...name]` → `*name`, `[name]` → `:name`, anything else unchanged.
fn normalize_segment(segment: &str) -> String {
    match segment
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        Some(inner) => match inner.strip_prefix("...") {
            Some(name) => format!("*{}", name),
            None => format!(":{}", inner),
        },
        None => segment.to_string(),
    }
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Split the extension off the final segment. Dotfiles keep their name.
fn split_extension(path: &str) -> (&str, Option<&str>) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
        _ => (path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SourceRoot {
        SourceRoot::site("/site/src/api", "**/*.js")
    }

    fn entry(relative: &str) -> RouteEntry {
        RouteEntry::from_source(&site(), Path::new(relative), Path::new("/out"))
    }

    #[test]
    fn test_index_maps_to_directory() {
        assert_eq!(entry("index.js").route, "");
        assert_eq!(entry("foo/index.js").route, "foo");
        assert_eq!(entry("foo/bar.js").route, "foo/bar");
    }

    #[test]
    fn test_paths_are_derived_from_root_and_output() {
        let e = entry("users/list.js");
        assert_eq!(e.original_source_path, PathBuf::from("/site/src/api/users/list.js"));
        assert_eq!(e.compiled_relative_path, PathBuf::from("site/users/list.js"));
        assert_eq!(e.compiled_absolute_path, PathBuf::from("/out/site/users/list.js"));
        assert_eq!(e.entry_key(), "site/users/list");
        assert_eq!(e.relative_path, "users/list.js");
        assert!(e.match_path.is_none());
        assert!(e.pattern().is_none());
    }

    #[test]
    fn test_dynamic_segments() {
        let colon = entry("users/:id.js");
        assert_eq!(colon.route, "users/:id");
        assert_eq!(colon.match_path.as_deref(), Some("users/:id"));
        assert!(colon.pattern().is_some());

        let bracket = entry("users/[id].js");
        assert_eq!(bracket.route, "users/:id");

        let splat = entry("files/[...rest].js");
        assert_eq!(splat.route, "files/*rest");

        let dir = entry("[org]/index.js");
        assert_eq!(dir.route, ":org");
    }

    #[test]
    fn test_external_entries_are_namespaced_in_output() {
        let root = SourceRoot::external("plugin-a", "/plugins/a/src/api", "**/*.js");
        let e = RouteEntry::from_source(&root, Path::new("hello.js"), Path::new("/out"));
        assert_eq!(e.route, "hello");
        assert_eq!(e.compiled_relative_path, PathBuf::from("plugin-a/hello.js"));
        assert_eq!(e.entry_key(), "plugin-a/hello");
    }

    #[test]
    fn test_table_keeps_first_route() {
        let mut table = RouteTable::new();
        assert!(table.insert(entry("foo.js")));
        assert!(!table.insert(entry("foo/index.js")));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("foo").unwrap().relative_path, "foo.js");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a/b.js"), ("a/b", Some("js")));
        assert_eq!(split_extension("a/b.test.js"), ("a/b.test", Some("js")));
        assert_eq!(split_extension("a.d/b"), ("a.d/b", None));
        assert_eq!(split_extension(".env"), (".env", None));
    }

    #[test]
    fn test_deserialized_table_recompiles_patterns() {
        let mut table = RouteTable::new();
        table.insert(entry("users/:id.js"));
        let json = serde_json::to_string(&table).unwrap();
        let restored: RouteTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, table);
        assert!(restored.get("users/:id").unwrap().pattern().is_some());
    }
}
