//! Function invocation.
//!
//! One child process per request. The request goes to stdin as JSON; stdout
//! carries a head line then the body. Failures are contained here and turned
//! into a 500 response unless the function already sent its head.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::discovery::RouteEntry;
use crate::error::ExecutionError;
use crate::executor::artifact;
use crate::executor::protocol::{FunctionRequest, FunctionResponse, ResponseHead};
use crate::observability::metrics;

/// Runs compiled functions.
#[derive(Debug, Clone)]
pub struct FunctionExecutor {
    working_dir: PathBuf,
}

impl FunctionExecutor {
    /// Functions run with `working_dir` (normally the site root) as their
    /// current directory.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run the function for `entry` once and fill in `response`.
    ///
    /// Never fails: errors are logged and, when nothing was sent yet, replace
    /// the response with a 500 naming the source file.
    pub async fn execute(
        &self,
        entry: &RouteEntry,
        request: &FunctionRequest,
        response: &mut FunctionResponse,
    ) {
        let start = Instant::now();
        let outcome = self.invoke(entry, request, response).await;
        let elapsed = start.elapsed();
        let source = entry.original_source_path.display().to_string();

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    route = %entry.route,
                    source = %source,
                    status = response.status.as_u16(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Function executed"
                );
            }
            Err(e) => {
                let replaced = response.send_error(&entry.original_source_path, &e.to_string());
                tracing::error!(
                    route = %entry.route,
                    source = %source,
                    error = %e,
                    response_sent = !replaced,
                    duration_ms = elapsed.as_millis() as u64,
                    "Function execution failed"
                );
            }
        }

        metrics::record_invocation(&entry.route, response.status.as_u16(), elapsed);
    }

    async fn invoke(
        &self,
        entry: &RouteEntry,
        request: &FunctionRequest,
        response: &mut FunctionResponse,
    ) -> Result<(), ExecutionError> {
        let invocable = artifact::load(entry)?;
        let payload = serde_json::to_vec(request)?;

        tracing::trace!(command = %invocable.command_line(), "Spawning function");
        let mut child = Command::new(&invocable.program)
            .args(&invocable.args)
            .current_dir(&self.working_dir)
            .env("FUNCTION_ROUTE", &entry.route)
            .env("FUNCTION_SOURCE", &entry.original_source_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: invocable.program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            if let Some(stdin) = stdin.as_mut() {
                // A function that ignores its input closes the pipe early.
                match stdin.write_all(&payload).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        });

        let mut stderr = child.stderr.take();
        let errors = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        if let Some(stdout) = child.stdout.take() {
            let mut stdout = BufReader::new(stdout);
            let mut head = Vec::new();
            if stdout.read_until(b'\n', &mut head).await? > 0 {
                response.send_head(ResponseHead::parse(&head)?);
                stdout.read_to_end(&mut response.body).await?;
            }
        }

        let status = child.wait().await?;
        let stderr = errors.await.unwrap_or_default();
        match writer.await {
            Ok(result) => result?,
            Err(e) => tracing::warn!(error = %e, "Function stdin writer panicked"),
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            return Err(ExecutionError::Exit {
                status: status.to_string(),
                stderr: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                },
            });
        }
        Ok(())
    }
}
