//! Function router
//!
//! Discovers function files, compiles them and serves them over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!   site/src/api/**  ─┐
//!   [[external]] dirs ─┼─▶ discovery ──▶ RouteTable ──▶ build (compiler, manifest)
//!   .env files       ─┘                     │
//!                                           ▼ (ArcSwap publish)
//!   Client ──▶ http server ──▶ routing::resolve ──▶ executor ──▶ function process
//! ```
//!
//! # Modes
//! - `develop`: watch session plus server, restarts on structural changes
//! - `build`: one-shot compile, writes the manifest, non-zero exit on errors
//! - `serve`: serve a previously built manifest
//! - `routes`: print the discovered route table

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use function_router::build::manifest;
use function_router::config::{load_config_or_default, DotenvProvider, HostConfig};
use function_router::lifecycle::spawn_signal_handler;
use function_router::observability::{init_logging, init_metrics};
use function_router::{
    BuildOrchestrator, FunctionExecutor, HttpServer, SharedRouteTable, Shutdown, StageCompiler,
    WatchSession,
};

#[derive(Parser)]
#[command(name = "function-router")]
#[command(about = "Discover, compile and serve function files", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "functions.toml")]
    config: PathBuf,

    /// Environment name (selects `.env.<environment>`).
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch, rebuild and serve
    Develop,
    /// Compile once and write the manifest
    Build,
    /// Serve a built manifest
    Serve {
        /// Manifest to load instead of the one in the cache directory.
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Print the discovered routes
    Routes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (mut config, from_file) = load_config_or_default(&cli.config)?;

    let default_environment = match cli.command {
        Commands::Develop | Commands::Routes => "development",
        Commands::Build | Commands::Serve { .. } => "production",
    };
    if let Some(environment) = cli.environment {
        config.build.environment = Some(environment);
    } else if config.build.environment.is_none() {
        config.build.environment = Some(default_environment.to_string());
    }

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        site = %config.site_root().display(),
        environment = config.environment(),
        "function-router starting"
    );
    if !from_file {
        tracing::info!(path = %cli.config.display(), "No config file found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let orchestrator = Arc::new(BuildOrchestrator::new(
        config.clone(),
        Arc::new(StageCompiler::new()),
        Arc::new(DotenvProvider::from_config(&config)),
    ));

    match cli.command {
        Commands::Develop => develop(config, orchestrator).await?,
        Commands::Build => {
            let table = orchestrator.discover().await;
            orchestrator.run_once(&table).await?;
        }
        Commands::Serve { manifest: path } => {
            let path = path.unwrap_or_else(|| orchestrator.manifest_path());
            let routes = SharedRouteTable::new(manifest::read_manifest(&path)?);
            serve(&config, routes).await?;
        }
        Commands::Routes => {
            let table = orchestrator.discover().await;
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn develop(
    config: Arc<HostConfig>,
    orchestrator: Arc<BuildOrchestrator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let routes = SharedRouteTable::default();
    let session = WatchSession::start(orchestrator, routes.clone()).await?;

    let shutdown = Shutdown::new();
    let session_shutdown = shutdown.subscribe();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown.clone());

    let listener = bind(&config).await?;
    let server = HttpServer::new(
        &config.server,
        routes,
        FunctionExecutor::new(config.site_root()),
    );
    let server = tokio::spawn(server.run(listener, server_shutdown));

    let outcome = session.run(session_shutdown).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Watch session failed");
        shutdown.trigger();
    }
    server.await??;
    outcome?;
    Ok(())
}

async fn serve(config: &HostConfig, routes: SharedRouteTable) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let listener = bind(config).await?;
    HttpServer::new(&config.server, routes, FunctionExecutor::new(config.site_root()))
        .run(listener, server_shutdown)
        .await?;
    Ok(())
}

async fn bind(config: &HostConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        prefix = %config.server.prefix,
        "Listening for connections"
    );
    Ok(listener)
}
