// HTTP request handlers
use crate::domain::events::AlertSeverity;
use crate::domain::widget::{DashboardId, WidgetId};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBody {
    pub alert_id: Uuid,
    pub severity: AlertSeverity,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

// Notification triggers for an out-of-process command layer. They queue
// and return immediately; delivery is never reported back.

pub async fn dashboard_list_changed(State(state): State<Arc<AppState>>) -> StatusCode {
    state.notifier.notify_dashboard_list_changed();
    StatusCode::ACCEPTED
}

pub async fn dashboard_updated(
    Path(id): Path<DashboardId>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    state.notifier.notify_dashboard_updated(id);
    StatusCode::ACCEPTED
}

pub async fn widget_added(
    Path((id, widget_id)): Path<(DashboardId, WidgetId)>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    state.notifier.notify_widget_added(id, widget_id);
    StatusCode::ACCEPTED
}

pub async fn widget_removed(
    Path((id, widget_id)): Path<(DashboardId, WidgetId)>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    state.notifier.notify_widget_removed(id, widget_id);
    StatusCode::ACCEPTED
}

pub async fn alert_triggered(
    Path(id): Path<DashboardId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AlertBody>,
) -> StatusCode {
    state
        .notifier
        .notify_alert_triggered(id, body.alert_id, body.severity);
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notifier::DashboardNotifier;
    use crate::domain::events::ServerEvent;
    use crate::infrastructure::hub::GroupHub;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_alert_endpoint_accepts_and_broadcasts() {
        let hub = Arc::new(GroupHub::new(8));
        let (notifier, _worker) = DashboardNotifier::spawn(hub.clone(), 8);
        let app = crate::presentation::router(Arc::new(AppState {
            hub: hub.clone(),
            notifier,
        }));

        let dashboard_id = Uuid::new_v4();
        let alert_id = Uuid::new_v4();
        let (viewer, mut rx) = hub.connect();
        hub.join(viewer, dashboard_id);

        let response = app
            .oneshot(
                Request::post(format!("/notifications/dashboards/{}/alerts", dashboard_id))
                    .header("content-type", "application/json")
                    .body(Body::from(format!(
                        r#"{{"alertId":"{}","severity":"Critical"}}"#,
                        alert_id
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<ServerEvent>(&frame).unwrap(),
            ServerEvent::AlertTriggered {
                dashboard_id,
                alert_id,
                severity: AlertSeverity::Critical,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let hub = Arc::new(GroupHub::new(8));
        let (notifier, _worker) = DashboardNotifier::spawn(hub.clone(), 8);
        let app = crate::presentation::router(Arc::new(AppState { hub, notifier }));

        let response = app
            .oneshot(
                Request::post("/notifications/dashboards/not-a-uuid/updated")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
