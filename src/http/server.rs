//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the routing prefix
//! - Wire up middleware (request ID, tracing, body limit)
//! - Resolve the path against the current route table snapshot
//! - Hand the request to the executor, or fall through to 404

use std::io;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::executor::{FunctionExecutor, FunctionResponse};
use crate::http::request::function_request;
use crate::lifecycle::Shutdown;
use crate::routing::{resolve, SharedRouteTable};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: SharedRouteTable,
    pub executor: Arc<FunctionExecutor>,
    pub max_body_bytes: usize,
}

/// HTTP front for the function router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, routes: SharedRouteTable, executor: FunctionExecutor) -> Self {
        let state = AppState {
            routes,
            executor: Arc::new(executor),
            max_body_bytes: config.max_body_bytes,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let prefix = config.prefix.trim_end_matches('/');
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route(prefix, any(prefix_root_handler))
            .route(&format!("{}/", prefix), any(prefix_root_handler))
            .route(&format!("{}/{{*path}}", prefix), any(function_handler))
            .fallback(not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The router, for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn prefix_root_handler(State(state): State<AppState>, request: Request) -> Response {
    dispatch(state, String::new(), request).await
}

async fn function_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    dispatch(state, path, request).await
}

/// Resolve and execute. The table snapshot is held for the whole request, so
/// a concurrent restart never changes which entry serves it.
async fn dispatch(state: AppState, path: String, request: Request) -> Response {
    let table = state.routes.load();
    let Some(matched) = resolve(&table, &path) else {
        tracing::debug!(path = %path, "No function matched");
        return not_found().await.into_response();
    };

    let entry = matched.entry;
    let request = match function_request(request, &path, matched.params, state.max_body_bytes).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(route = %entry.route, error = %e, "Rejected request body");
            return e.into_response();
        }
    };

    let mut response = FunctionResponse::new();
    state.executor.execute(entry, &request, &mut response).await;
    response.into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
