//! Function discovery across source roots.

use std::path::Path;

use crate::discovery::entry::{RouteEntry, RouteTable, SourceRoot};
use crate::discovery::glob::{walk_files, GlobMatcher};
use crate::error::DiscoveryError;

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    pub table: RouteTable,
    /// Roots that failed to scan. Their functions are absent from `table`.
    pub errors: Vec<DiscoveryError>,
}

/// Scan every root concurrently and fold the results into one table.
///
/// The site root is folded first, then external roots in the order given.
/// When a route is already present the later entry is discarded.
pub async fn discover(roots: &[SourceRoot], output_dir: &Path) -> Discovery {
    let mut ordered: Vec<&SourceRoot> = roots.iter().collect();
    ordered.sort_by_key(|root| !root.id.is_site());

    let handles: Vec<_> = ordered
        .iter()
        .map(|root| {
            let root = (*root).clone();
            let output_dir = output_dir.to_path_buf();
            tokio::task::spawn_blocking(move || scan_root(&root, &output_dir))
        })
        .collect();

    let mut discovery = Discovery::default();
    for (root, handle) in ordered.into_iter().zip(handles) {
        let entries = match handle.await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                tracing::warn!(root = %root.id, error = %e, "Skipping source root");
                discovery.errors.push(e);
                continue;
            }
            Err(e) => {
                let err = DiscoveryError::Task {
                    root: root.id.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(root = %root.id, error = %err, "Skipping source root");
                discovery.errors.push(err);
                continue;
            }
        };

        for entry in entries {
            let route = entry.route.clone();
            let source = entry.original_source_path.clone();
            if !discovery.table.insert(entry) {
                tracing::debug!(
                    route = %route,
                    root = %root.id,
                    source = %source.display(),
                    "Route already provided by a higher-precedence function"
                );
            }
        }
    }

    tracing::debug!(routes = discovery.table.len(), "Discovery finished");
    discovery
}

/// Scan a single root into entries, in sorted file order.
pub fn scan_root(root: &SourceRoot, output_dir: &Path) -> Result<Vec<RouteEntry>, DiscoveryError> {
    let matcher = GlobMatcher::new(&root.glob).map_err(|reason| DiscoveryError::Glob {
        root: root.id.to_string(),
        glob: root.glob.clone(),
        reason,
    })?;

    let files = walk_files(&root.base_dir).map_err(|source| DiscoveryError::Io {
        root: root.id.to_string(),
        dir: root.base_dir.clone(),
        source,
    })?;

    Ok(files
        .iter()
        .filter(|relative| matcher.matches_path(relative))
        .map(|relative| RouteEntry::from_source(root, relative, output_dir))
        .collect())
}
