use kpi_dashboard::{router, AppState, Config, JsonFileStore, MemoryStore, ReportStore, StoreKind};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let store: Arc<dyn ReportStore> = match &config.store {
        StoreKind::File(path) => Arc::new(JsonFileStore::open(path.clone()).await?),
        StoreKind::Memory => {
            warn!("using in-memory report store; reports are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let app = router(AppState::new(store, &config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
