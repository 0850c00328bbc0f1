// Terminal viewer - follows live dashboards through the realtime hub
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use dashboard_realtime::client::alerts::AlertStore;
use dashboard_realtime::client::connection::{ConnectionManager, ReconnectPolicy};
use dashboard_realtime::client::queries::{DashboardDefinition, DashboardQueries};
use dashboard_realtime::client::subscription::{DashboardListSubscription, DashboardSubscription};
use dashboard_realtime::client::view_cache::CachedWidget;
use dashboard_realtime::infrastructure::config::load_client_config;
use dashboard_realtime::infrastructure::http_catalog::HttpDashboardRepository;
use dashboard_realtime::infrastructure::ws_connector::WebSocketConnector;

#[derive(Debug, Parser)]
#[command(name = "dashboard-watch", about = "Follow live dashboards from the terminal")]
struct Cli {
    /// Dashboard to follow; repeat for more than one
    #[arg(long = "dashboard", required = true)]
    dashboards: Vec<Uuid>,

    /// Hub WebSocket URL, overrides the configured one
    #[arg(long)]
    url: Option<String>,

    /// Dashboard API root, overrides the configured one
    #[arg(long)]
    api: Option<String>,

    /// Seconds between cache summaries
    #[arg(long, default_value_t = 5)]
    report_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = load_client_config()?;
    if let Some(url) = cli.url {
        config.url = url;
    }
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }

    let queries = Arc::new(HttpDashboardRepository::new(&config.api_base_url)?);
    let connection = Arc::new(ConnectionManager::start(
        Arc::new(WebSocketConnector::new(&config.url)),
        ReconnectPolicy::new(config.backoff(), config.max_reconnect_attempts),
    ));
    let alerts = Arc::new(AlertStore::new());
    let list = DashboardListSubscription::start(&connection, queries.clone());

    let mut subscriptions = Vec::with_capacity(cli.dashboards.len());
    for dashboard_id in cli.dashboards {
        let definition = match queries.invalidate_dashboard(dashboard_id).await {
            Ok(definition) => definition,
            Err(e) => {
                tracing::warn!("Could not load dashboard {}, widget types unknown: {:#}", dashboard_id, e);
                unknown_dashboard(dashboard_id)
            }
        };
        subscriptions.push(DashboardSubscription::mount(
            &definition,
            connection.clone(),
            queries.clone(),
            alerts.clone(),
        ));
    }

    let mut report = tokio::time::interval(Duration::from_secs(cli.report_secs.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                tracing::info!(
                    "{} | {} alerts | {} dashboards listed",
                    connection.state(),
                    alerts.len(),
                    list.dashboards().borrow().len()
                );
                for subscription in &subscriptions {
                    log_summary(subscription);
                }
            }
        }
    }

    for subscription in subscriptions {
        subscription.unmount().await;
    }
    list.stop().await;
    connection.dispose().await;

    Ok(())
}

fn unknown_dashboard(id: Uuid) -> DashboardDefinition {
    DashboardDefinition {
        id,
        title: String::new(),
        description: String::new(),
        status: String::new(),
        widgets: Vec::new(),
    }
}

fn log_summary(subscription: &DashboardSubscription) {
    let cache = subscription.cache();
    let streaming = subscription.streaming_widgets();
    let series_points: usize = streaming
        .iter()
        .filter_map(|id| match cache.get(*id) {
            Some(CachedWidget::Series(points)) => Some(points.len()),
            _ => None,
        })
        .sum();

    tracing::info!(
        "dashboard {}: {} widgets cached, {} series points",
        subscription.dashboard_id(),
        cache.len(),
        series_points
    );
}
