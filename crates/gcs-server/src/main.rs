//! Ground-control server - command gate, telemetry loop and event stream

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcs_server::config::Config;
use gcs_server::state::AppState;
use gcs_server::{api, backend, loops};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("gcs_server=debug".parse()?)
            .add_directive("gcs_core=info".parse()?))
        .init();

    tracing::info!("Starting ground-control server...");

    let config = Config::from_env();
    let port = config.server_port;
    let vehicle = backend::select_vehicle(&config, None);
    let state = Arc::new(AppState::new(config, vehicle));
    tracing::info!("Backend mode: {}", state.backend_mode());

    // Start background loops
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let handles = loops::spawn_loops(&state, &shutdown_tx);

    // Build the app
    let app = api::routes()
        .with_state(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down server...");
        })
        .await?;

    loops::shutdown_loops(&state, &shutdown_tx, handles).await;
    Ok(())
}
