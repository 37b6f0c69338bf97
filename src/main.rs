// ABOUTME: Entry point for aube — runs the Control Plane and Reverse Proxy in one process.
// ABOUTME: Parses CLI flags, loads config, wires up the engine client, and serves until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use aube::backend::Backend;
use aube::config::Config;
use aube::controlplane::{self, ControlPlane};
use aube::dispatcher::{self, DispatcherState};
use aube::error::{Error, Result};
use aube::pool::Registry;
use aube::runtime::BollardBackend;
use aube::shutdown;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aube", about = "A minimal function-as-a-service platform")]
struct Cli {
    /// Directory to look for `aube.yml` in. Defaults to the current directory.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| Error::transient(e.to_string()))?,
    };
    let config = Arc::new(Config::discover(&config_dir)?);

    let engine = Arc::new(
        BollardBackend::connect_from_env()
            .map_err(|e| Error::engine_failure(e.to_string()))?,
    );

    let backend = Backend::new(engine, config.clone());
    let control_plane = Arc::new(ControlPlane::new(backend, config.clone()));

    let registry = Arc::new(Registry::new(config.clone()));
    let dispatcher_state = DispatcherState {
        registry,
        config: config.clone(),
    };

    let cp_router = controlplane::router(control_plane.clone());
    let cp_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.cp_port))
        .await
        .map_err(|e| Error::transient(e.to_string()))?;
    tracing::info!("control plane listening on :{}", config.cp_port);

    let rp_admin_router = dispatcher::admin_router(dispatcher_state.clone());
    let rp_invoke_router = dispatcher::invoke_router(dispatcher_state);
    let rp_admin_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.rp_admin_port))
        .await
        .map_err(|e| Error::transient(e.to_string()))?;
    let rp_user_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.rp_user_port))
        .await
        .map_err(|e| Error::transient(e.to_string()))?;
    tracing::info!(
        "reverse proxy listening on :{} (admin) and :{} (invoke)",
        config.rp_admin_port,
        config.rp_user_port
    );

    let (rp_shutdown_tx, mut rp_shutdown_rx) = tokio::sync::oneshot::channel();

    let cp_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(cp_listener, cp_router).await {
            tracing::error!("control plane server error: {}", e);
        }
    });

    let rp_admin_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(rp_admin_listener, rp_admin_router).await {
            tracing::error!("rp admin server error: {}", e);
        }
    });

    let rp_user_task = tokio::spawn(async move {
        let server = axum::serve(rp_user_listener, rp_invoke_router);
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    tracing::error!("rp invoke server error: {}", e);
                }
            }
            _ = &mut rp_shutdown_rx => {
                tracing::info!("rp invoke server shutting down");
            }
        }
    });

    shutdown::wait_and_shut_down(control_plane, rp_shutdown_tx).await;

    cp_task.abort();
    rp_admin_task.abort();
    let _ = rp_user_task.await;

    Ok(())
}
