//! Continuous (development) build session.
//!
//! Adapts the config watcher's notify pattern: filesystem events are pushed
//! into a channel and handled on the session task, which is the only writer
//! of the shared route table.
//!
//! ```text
//! Idle → Building { first } → Watching ⇄ Restarting → Watching
//!                                  └──────────→ Fatal (restart failed)
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::build::compiler::{CompileResult, WatchHandle};
use crate::build::orchestrator::{entry_map, BuildOrchestrator};
use crate::discovery::glob::{is_visible, GlobMatcher};
use crate::discovery::{RouteTable, SourceRoot};
use crate::error::RestartError;
use crate::observability::metrics;
use crate::routing::SharedRouteTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A compiler watch is running; `first` until the first cycle reports.
    Building { first: bool },
    Watching,
    Restarting,
    Fatal,
}

/// What a filesystem event means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsChange {
    Ignore,
    Restart,
}

/// A source root with its glob compiled, for event classification.
#[derive(Debug, Clone)]
pub struct WatchedRoot {
    pub root: SourceRoot,
    matcher: GlobMatcher,
}

impl WatchedRoot {
    pub fn new(root: SourceRoot) -> Option<Self> {
        match GlobMatcher::new(&root.glob) {
            Ok(matcher) => Some(Self { root, matcher }),
            Err(reason) => {
                tracing::warn!(root = %root.id, glob = %root.glob, reason = %reason, "Not watching root with invalid glob");
                None
            }
        }
    }

    fn matches(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root.base_dir) {
            Ok(relative) => {
                !relative.as_os_str().is_empty() && is_visible(relative) && self.matcher.matches_path(relative)
            }
            Err(_) => false,
        }
    }

    fn is_base(&self, path: &Path) -> bool {
        path == self.root.base_dir
    }

    fn contains(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root.base_dir)
            .is_ok_and(|relative| is_visible(relative))
    }
}

/// Decide whether an event changes the set of routes or the env inputs.
///
/// Content edits to existing function files are left to the compiler's own
/// incremental rebuild. That covers files shadowed by a higher-precedence
/// root and atomic saves that rename a temporary file onto a known function.
pub fn classify_event(
    event: &Event,
    roots: &[WatchedRoot],
    env_files: &[PathBuf],
    table: &RouteTable,
) -> FsChange {
    if matches!(event.kind, EventKind::Access(_)) {
        return FsChange::Ignore;
    }

    let structural = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    let content = !structural;

    for (index, path) in event.paths.iter().enumerate() {
        if env_files.iter().any(|env| env == path) {
            return FsChange::Restart;
        }

        if roots.iter().any(|root| root.matches(path)) {
            let known = table.contains_source(path);
            if content && (known || path.is_file()) {
                continue;
            }
            if is_rename_target(&event.kind, index) && known && path.is_file() {
                continue;
            }
            if structural || content {
                return FsChange::Restart;
            }
            continue;
        }

        // A directory holding functions was removed or renamed, a root
        // directory appeared, or a new directory appeared inside a root.
        if structural {
            let holds_functions = table
                .iter()
                .any(|entry| entry.original_source_path.starts_with(path));
            let is_root = roots.iter().any(|root| root.is_base(path));
            let new_dir = matches!(event.kind, EventKind::Create(CreateKind::Folder))
                && roots.iter().any(|root| root.contains(path));
            if holds_functions || is_root || new_dir {
                return FsChange::Restart;
            }
        }
    }
    FsChange::Ignore
}

/// Whether `paths[index]` is the destination of a rename. `Both` events list
/// the source first.
fn is_rename_target(kind: &EventKind, index: usize) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => index == 1,
        _ => false,
    }
}

/// Process-wide state for development mode.
pub struct WatchSession {
    orchestrator: Arc<BuildOrchestrator>,
    routes: SharedRouteTable,
    state: SessionState,
    handle: Option<Box<dyn WatchHandle>>,
    results_tx: mpsc::UnboundedSender<CompileResult>,
    results_rx: mpsc::UnboundedReceiver<CompileResult>,
    fs_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    subscription: RecommendedWatcher,
    subscribed: HashSet<PathBuf>,
    roots: Vec<WatchedRoot>,
    env_files: Vec<PathBuf>,
    debounce: Duration,
}

impl WatchSession {
    /// Discover, publish the table, start the compiler watch and subscribe
    /// to filesystem events.
    pub async fn start(
        orchestrator: Arc<BuildOrchestrator>,
        routes: SharedRouteTable,
    ) -> Result<Self, RestartError> {
        let (fs_tx, fs_rx) = mpsc::unbounded_channel();
        let subscription = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = fs_tx.send(res);
            },
            Config::default(),
        )?;
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let roots = orchestrator
            .source_roots()
            .into_iter()
            .filter_map(WatchedRoot::new)
            .collect();
        let env_files = orchestrator.env_files();
        let debounce = Duration::from_millis(orchestrator.config().build.debounce_ms);

        let mut session = Self {
            orchestrator,
            routes,
            state: SessionState::Idle,
            handle: None,
            results_tx,
            results_rx,
            fs_rx,
            subscription,
            subscribed: HashSet::new(),
            roots,
            env_files,
            debounce,
        };

        session.subscribe();
        let table = session.orchestrator.discover().await;
        session.routes.publish(table);
        session.start_compiler().await?;
        session.state = SessionState::Building { first: true };

        tracing::info!(routes = session.routes.load().len(), "Watch session started");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn routes(&self) -> &SharedRouteTable {
        &self.routes
    }

    /// Handle compiler cycles and filesystem events until shutdown.
    ///
    /// Returns an error only when a restart fails.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RestartError> {
        loop {
            tokio::select! {
                Some(result) = self.results_rx.recv() => self.on_cycle(result),
                Some(event) = self.fs_rx.recv() => match event {
                    Ok(event) => {
                        if self.classify(&event) == FsChange::Restart {
                            tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Structural change detected");
                            self.settle().await;
                            self.restart().await?;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Watch session received shutdown signal");
                    break;
                }
            }
        }
        self.stop().await
    }

    pub fn classify(&self, event: &Event) -> FsChange {
        classify_event(event, &self.roots, &self.env_files, &self.routes.load())
    }

    /// Stop the current compiler, re-discover, publish, start a new compiler.
    pub async fn restart(&mut self) -> Result<(), RestartError> {
        let first_pending = self.state == SessionState::Building { first: true };
        self.state = SessionState::Restarting;
        tracing::info!("Restarting function compilation");
        metrics::record_restart();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.stop().await {
                self.state = SessionState::Fatal;
                return Err(RestartError::Stop(e));
            }
        }
        // Cycles from the stopped handle describe the old table.
        while self.results_rx.try_recv().is_ok() {}

        self.subscribe();
        let table = self.orchestrator.discover().await;
        self.routes.publish(table);
        self.start_compiler().await?;

        self.state = if first_pending {
            SessionState::Building { first: true }
        } else {
            SessionState::Watching
        };
        Ok(())
    }

    /// Stop the compiler watch. The session is idle afterwards.
    pub async fn stop(&mut self) -> Result<(), RestartError> {
        if let Some(handle) = self.handle.take() {
            handle.stop().await.map_err(RestartError::Stop)?;
        }
        self.state = SessionState::Idle;
        tracing::info!("Watch session stopped");
        Ok(())
    }

    /// Wait out the debounce window and drop the events that arrived in it.
    async fn settle(&mut self) {
        tokio::time::sleep(self.debounce).await;
        while self.fs_rx.try_recv().is_ok() {}
    }

    async fn start_compiler(&mut self) -> Result<(), RestartError> {
        let table = self.routes.load();
        let entries = entry_map(&table);
        let options = self.orchestrator.compile_options();
        let results_tx = self.results_tx.clone();

        match self
            .orchestrator
            .compiler()
            .watch(entries, options, Box::new(move |result| {
                let _ = results_tx.send(result);
            }))
            .await
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Fatal;
                Err(RestartError::Start(e))
            }
        }
    }

    fn on_cycle(&mut self, result: CompileResult) {
        result.report();
        let success = result.success();
        metrics::record_build(if success { "success" } else { "failure" });

        if success {
            if let Err(e) = self.orchestrator.write_manifest(&self.routes.load()) {
                tracing::error!(error = %e, "Failed to write manifest");
            }
        } else {
            tracing::warn!(
                errors = result.errors().count(),
                "Functions failed to compile, serving previous artifacts"
            );
        }

        match self.state {
            SessionState::Building { first: true } => {
                self.state = SessionState::Watching;
                tracing::info!(routes = self.routes.load().len(), "Functions compiled");
            }
            _ if success => tracing::info!("Functions rebuilt"),
            _ => {}
        }
    }

    /// Register watches for every root and the env file directories that exist
    /// and are not yet watched. Missing roots get their parent watched so the
    /// root's creation is noticed.
    fn subscribe(&mut self) {
        let mut targets: Vec<(PathBuf, RecursiveMode)> = Vec::new();
        for root in &self.roots {
            let base = &root.root.base_dir;
            if base.is_dir() {
                targets.push((base.clone(), RecursiveMode::Recursive));
            } else if let Some(parent) = base.ancestors().skip(1).find(|p| p.is_dir()) {
                targets.push((parent.to_path_buf(), RecursiveMode::NonRecursive));
            }
        }
        for env in &self.env_files {
            if let Some(parent) = env.parent().filter(|p| p.is_dir()) {
                targets.push((parent.to_path_buf(), RecursiveMode::NonRecursive));
            }
        }

        for (path, mode) in targets {
            let key = match mode {
                RecursiveMode::Recursive => path.join("**"),
                RecursiveMode::NonRecursive => path.clone(),
            };
            if self.subscribed.contains(&key) {
                continue;
            }
            match self.subscription.watch(&path, mode) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), ?mode, "Watching for function changes");
                    self.subscribed.insert(key);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to watch path"),
            }
        }
    }
}
