//! Route lookup.
//!
//! # Responsibilities
//! - Look up the entry for the remaining path
//! - Return the matched entry with its path parameters, or an explicit no-match
//!
//! # Design Decisions
//! - Exact routes are checked before any dynamic pattern
//! - Dynamic patterns are tried in table order; first match wins
//! - No-match is `None` so the caller can fall through to its next handler

use crate::discovery::{RouteEntry, RouteTable};
use crate::routing::matcher::PathParams;

/// A resolved function together with the parameters captured for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// Resolve a path (already stripped of the routing prefix) against a table.
///
/// Leading and trailing `/` are ignored.
pub fn resolve<'a>(table: &'a RouteTable, path: &str) -> Option<RouteMatch<'a>> {
    let path = path.trim_matches('/');

    if let Some(entry) = table.get(path) {
        return Some(RouteMatch {
            entry,
            params: PathParams::new(),
        });
    }

    table.iter().find_map(|entry| {
        let params = entry.pattern()?.captures(path)?;
        Some(RouteMatch { entry, params })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceRoot;
    use std::path::Path;

    fn table(files: &[&str]) -> RouteTable {
        let root = SourceRoot::site("/site/src/api", "**/*.js");
        let mut table = RouteTable::new();
        for file in files {
            table.insert(RouteEntry::from_source(&root, Path::new(file), Path::new("/out")));
        }
        table
    }

    #[test]
    fn test_exact_match_has_no_params() {
        let table = table(&["index.js", "hello.js"]);

        let root = resolve(&table, "").unwrap();
        assert_eq!(root.entry.relative_path, "index.js");
        assert!(root.params.is_empty());

        let hello = resolve(&table, "hello").unwrap();
        assert_eq!(hello.entry.relative_path, "hello.js");
        assert!(resolve(&table, "hello/").is_some());
    }

    #[test]
    fn test_dynamic_route_extracts_params() {
        let table = table(&["products/:id.js"]);

        let matched = resolve(&table, "products/42").unwrap();
        assert_eq!(matched.params.get("id"), Some("42"));

        assert!(resolve(&table, "products").is_none());
    }

    #[test]
    fn test_exact_beats_dynamic_regardless_of_order() {
        let table = table(&[":slug.js", "a.js"]);

        let matched = resolve(&table, "a").unwrap();
        assert_eq!(matched.entry.relative_path, "a.js");

        let other = resolve(&table, "b").unwrap();
        assert_eq!(other.entry.relative_path, ":slug.js");
        assert_eq!(other.params.get("slug"), Some("b"));
    }

    #[test]
    fn test_first_dynamic_pattern_wins() {
        let table = table(&["users/:id.js", "users/:name.js"]);
        let matched = resolve(&table, "users/7").unwrap();
        assert_eq!(matched.entry.route, "users/:id");
        assert_eq!(matched.params.get("id"), Some("7"));
    }

    #[test]
    fn test_no_match() {
        let table = table(&["hello.js", "users/:id.js"]);
        assert!(resolve(&table, "missing").is_none());
        assert!(resolve(&table, "users/7/posts").is_none());
    }
}
