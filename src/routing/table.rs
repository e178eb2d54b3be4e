//! Shared, atomically swappable route table.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::discovery::RouteTable;

/// Single-writer, many-reader handle to the live route table.
///
/// Readers take a snapshot with [`load`](Self::load) and keep it for the
/// whole request; the writer replaces the table wholesale.
#[derive(Clone)]
pub struct SharedRouteTable {
    inner: Arc<Inner>,
}

struct Inner {
    table: ArcSwap<RouteTable>,
    generation: AtomicU64,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: ArcSwap::from_pointee(table),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.inner.table.load_full()
    }

    /// Replace the table. Returns the new generation number.
    pub fn publish(&self, table: RouteTable) -> u64 {
        let routes = table.len();
        self.inner.table.store(Arc::new(table));
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(routes, generation, "Route table published");
        generation
    }

    /// Number of tables published since construction.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::new(RouteTable::new())
    }
}

impl fmt::Debug for SharedRouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRouteTable")
            .field("routes", &self.load().len())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{RouteEntry, SourceRoot};
    use std::path::Path;

    fn table(files: &[&str]) -> RouteTable {
        let root = SourceRoot::site("/site", "**/*.js");
        let mut table = RouteTable::new();
        for file in files {
            table.insert(RouteEntry::from_source(&root, Path::new(file), Path::new("/out")));
        }
        table
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let shared = SharedRouteTable::new(table(&["a.js"]));
        let before = shared.load();

        assert_eq!(shared.publish(table(&["a.js", "b.js"])), 1);

        assert_eq!(before.routes(), vec!["a"]);
        assert_eq!(shared.load().routes(), vec!["a", "b"]);
        assert_eq!(shared.generation(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let shared = SharedRouteTable::default();
        let reader = shared.clone();
        shared.publish(table(&["x.js"]));
        assert_eq!(reader.load().routes(), vec!["x"]);
        assert_eq!(reader.generation(), 1);
    }
}
