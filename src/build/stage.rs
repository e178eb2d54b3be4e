//! Default compiler: stages function sources into the output directory.
//!
//! Each entry is copied with build-time constants substituted, optionally
//! minified, made executable, and accompanied by a source map. Watch mode
//! recompiles the whole entry set whenever one of the sources changes.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::build::compiler::{
    CompileOptions, CompileResult, Compiler, Diagnostic, EntryMap, OnResult, WatchHandle,
};
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, Default)]
pub struct StageCompiler;

impl StageCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile all entries synchronously.
    pub fn compile_entries(entries: &EntryMap, options: &CompileOptions) -> CompileResult {
        let mut result = CompileResult::default();
        let substitutions = match Substitutions::new(&options.defines) {
            Ok(substitutions) => substitutions,
            Err(e) => {
                result
                    .diagnostics
                    .push(Diagnostic::error(None, format!("invalid build constants: {}", e)));
                return result;
            }
        };

        for (key, source) in entries {
            match stage_entry(key, source, options, &substitutions) {
                Ok(mut emitted) => result.emitted.append(&mut emitted),
                Err(diagnostic) => result.diagnostics.push(diagnostic),
            }
        }
        result
    }

    async fn compile_in_background(entries: EntryMap, options: CompileOptions) -> CompileResult {
        tokio::task::spawn_blocking(move || Self::compile_entries(&entries, &options))
            .await
            .unwrap_or_else(|e| CompileResult {
                diagnostics: vec![Diagnostic::error(None, format!("compile task failed: {}", e))],
                emitted: Vec::new(),
            })
    }
}

#[async_trait]
impl Compiler for StageCompiler {
    async fn compile(&self, entries: &EntryMap, options: &CompileOptions) -> CompileResult {
        Self::compile_in_background(entries.clone(), options.clone()).await
    }

    async fn watch(
        &self,
        entries: EntryMap,
        options: CompileOptions,
        on_result: OnResult,
    ) -> Result<Box<dyn WatchHandle>, CompileError> {
        let sources: HashSet<PathBuf> = entries.values().cloned().collect();
        let dirs: HashSet<PathBuf> = sources
            .iter()
            .filter_map(|source| source.parent().map(Path::to_path_buf))
            .collect();

        let (change_tx, mut change_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_source = event.paths.iter().any(|p| sources.contains(p));
                    if touches_source && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = change_tx.send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Compiler watch error"),
            },
            Config::default(),
        )
        .map_err(|e| CompileError::Watch(e.to_string()))?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| CompileError::Watch(format!("{}: {}", dir.display(), e)))?;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            on_result(Self::compile_in_background(entries.clone(), options.clone()).await);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    changed = change_rx.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        // Coalesce a burst of writes into one cycle.
                        while change_rx.try_recv().is_ok() {}
                        tracing::debug!(entries = entries.len(), "Function source changed, recompiling");
                        on_result(Self::compile_in_background(entries.clone(), options.clone()).await);
                    }
                }
            }
        });

        tracing::debug!(dirs = dirs.len(), "Compiler watch started");
        Ok(Box::new(StageWatch {
            watcher: Some(watcher),
            stop_tx: Some(stop_tx),
            task,
        }))
    }
}

struct StageWatch {
    watcher: Option<RecommendedWatcher>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

#[async_trait]
impl WatchHandle for StageWatch {
    async fn stop(mut self: Box<Self>) -> Result<(), CompileError> {
        // No new change events once the watcher is gone.
        drop(self.watcher.take());
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| CompileError::Stop(e.to_string()))?;
        tracing::debug!("Compiler watch stopped");
        Ok(())
    }
}

/// Replaces define tokens, skipping matches that run into a longer identifier.
struct Substitutions<'a> {
    regex: Option<Regex>,
    defines: &'a BTreeMap<String, String>,
}

impl<'a> Substitutions<'a> {
    fn new(defines: &'a BTreeMap<String, String>) -> Result<Self, regex::Error> {
        if defines.is_empty() {
            return Ok(Self { regex: None, defines });
        }
        let mut keys: Vec<&String> = defines.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            regex: Some(Regex::new(&alternation)?),
            defines,
        })
    }

    fn apply(&self, text: &str) -> String {
        let Some(regex) = &self.regex else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for found in regex.find_iter(text) {
            let before = text[..found.start()].chars().next_back();
            let after = text[found.end()..].chars().next();
            if is_ident_char(before) || is_ident_char(after) {
                continue;
            }
            out.push_str(&text[last..found.start()]);
            out.push_str(&self.defines[found.as_str()]);
            last = found.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

fn is_ident_char(c: Option<char>) -> bool {
    matches!(c, Some(c) if c.is_alphanumeric() || c == '_' || c == '$')
}

fn minify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

fn stage_entry(
    key: &str,
    source: &Path,
    options: &CompileOptions,
    substitutions: &Substitutions<'_>,
) -> Result<Vec<PathBuf>, Diagnostic> {
    let fail = |message: String| Diagnostic::error(Some(source.to_path_buf()), message);

    let text = fs::read_to_string(source).map_err(|e| fail(format!("failed to read source: {}", e)))?;
    let mut compiled = substitutions.apply(&text);
    if options.minify {
        compiled = minify(&compiled);
    }

    let file_name = match source.extension() {
        Some(ext) => format!("{}.{}", key, ext.to_string_lossy()),
        None => key.to_string(),
    };
    let artifact = options.output_dir.join(&file_name);
    if let Some(parent) = artifact.parent() {
        fs::create_dir_all(parent).map_err(|e| fail(format!("failed to create {}: {}", parent.display(), e)))?;
    }
    fs::write(&artifact, compiled).map_err(|e| fail(format!("failed to write {}: {}", artifact.display(), e)))?;
    make_executable(source, &artifact).map_err(|e| fail(format!("failed to set permissions: {}", e)))?;

    let mut emitted = vec![artifact.clone()];
    if options.source_maps {
        let map_path = PathBuf::from(format!("{}.map", artifact.display()));
        let map = serde_json::json!({
            "version": 3,
            "file": artifact.file_name().map(|n| n.to_string_lossy().into_owned()),
            "sources": [source.display().to_string()],
            "names": [],
            "mappings": "",
        });
        fs::write(&map_path, map.to_string()).map_err(|e| fail(format!("failed to write source map: {}", e)))?;
        emitted.push(map_path);
    }
    Ok(emitted)
}

#[cfg(unix)]
fn make_executable(source: &Path, artifact: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(source)?.permissions().mode();
    fs::set_permissions(artifact, fs::Permissions::from_mode((mode & 0o7777) | 0o100))
}

#[cfg(not(unix))]
fn make_executable(_source: &Path, _artifact: &Path) -> std::io::Result<()> {
    Ok(())
}
