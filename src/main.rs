// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dashboard_realtime::application::catalog::DashboardCatalog;
use dashboard_realtime::application::catalog_repository::DashboardCatalogRepository;
use dashboard_realtime::application::generator::{MetricGenerator, ThreadRandom};
use dashboard_realtime::application::notifier::DashboardNotifier;
use dashboard_realtime::application::scheduler::SimulationScheduler;
use dashboard_realtime::domain::metric::MetricStateStore;
use dashboard_realtime::infrastructure::config::{load_realtime_config, CatalogSource};
use dashboard_realtime::infrastructure::file_catalog::FileCatalogRepository;
use dashboard_realtime::infrastructure::http_catalog::HttpDashboardRepository;
use dashboard_realtime::infrastructure::hub::GroupHub;
use dashboard_realtime::presentation::{self, app_state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_realtime_config()?;

    // Create repository (infrastructure layer)
    let repository: Arc<dyn DashboardCatalogRepository> = match config.catalog.source {
        CatalogSource::File => Arc::new(FileCatalogRepository::new(&config.catalog.path)),
        CatalogSource::Http => Arc::new(HttpDashboardRepository::with_timeout(
            &config.catalog.base_url,
            config.catalog.request_timeout(),
        )?),
    };
    let hub = Arc::new(GroupHub::new(config.server.client_buffer));

    // Create services (application layer)
    let catalog = Arc::new(DashboardCatalog::new(repository));
    let generator = MetricGenerator::new(Arc::new(MetricStateStore::new()), Arc::new(ThreadRandom));
    let (notifier, notifier_worker) = DashboardNotifier::spawn(hub.clone(), config.server.notify_buffer);
    let scheduler = SimulationScheduler::new(
        catalog,
        generator,
        hub.clone(),
        config.simulation.scheduler_settings(),
    );

    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    // Create application state
    let state = Arc::new(AppState { hub, notifier });

    // Build router (presentation layer)
    let router = presentation::router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind_addr))?;
    tracing::info!("Starting dashboard-realtime service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    scheduler_task.await?;
    notifier_worker.abort();

    Ok(())
}
