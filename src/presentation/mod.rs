// Presentation layer - HTTP routes and the WebSocket hub endpoint
pub mod app_state;
pub mod handlers;
pub mod websocket;

use crate::presentation::app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/hubs/dashboard", get(websocket::ws_handler))
        .route(
            "/notifications/dashboard-list-changed",
            post(handlers::dashboard_list_changed),
        )
        .route(
            "/notifications/dashboards/:id/updated",
            post(handlers::dashboard_updated),
        )
        .route(
            "/notifications/dashboards/:id/widgets/:widget_id/added",
            post(handlers::widget_added),
        )
        .route(
            "/notifications/dashboards/:id/widgets/:widget_id/removed",
            post(handlers::widget_removed),
        )
        .route(
            "/notifications/dashboards/:id/alerts",
            post(handlers::alert_triggered),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
