// Dashboard notifier - fire-and-forget change notifications for the command layer
use crate::domain::events::{AlertSeverity, ServerEvent};
use crate::domain::widget::{DashboardId, WidgetId};
use crate::infrastructure::hub::GroupHub;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Queues notifications for a background delivery task. Every `notify_*`
/// call returns immediately; a full or closed queue is logged and dropped
/// so a committed mutation is never affected.
#[derive(Clone)]
pub struct DashboardNotifier {
    tx: mpsc::Sender<ServerEvent>,
}

impl DashboardNotifier {
    pub fn spawn(hub: Arc<GroupHub>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(deliver(hub, rx));
        (Self { tx }, handle)
    }

    pub fn notify_dashboard_list_changed(&self) {
        self.post(ServerEvent::DashboardListChanged);
    }

    pub fn notify_dashboard_updated(&self, dashboard_id: DashboardId) {
        self.post(ServerEvent::DashboardUpdated { dashboard_id });
    }

    pub fn notify_widget_added(&self, dashboard_id: DashboardId, widget_id: WidgetId) {
        self.post(ServerEvent::WidgetAdded {
            dashboard_id,
            widget_id,
        });
    }

    pub fn notify_widget_removed(&self, dashboard_id: DashboardId, widget_id: WidgetId) {
        self.post(ServerEvent::WidgetRemoved {
            dashboard_id,
            widget_id,
        });
    }

    pub fn notify_alert_triggered(
        &self,
        dashboard_id: DashboardId,
        alert_id: Uuid,
        severity: AlertSeverity,
    ) {
        self.post(ServerEvent::AlertTriggered {
            dashboard_id,
            alert_id,
            severity,
        });
    }

    fn post(&self, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!("Dropping {} notification: {}", name, e);
        }
    }
}

async fn deliver(hub: Arc<GroupHub>, mut rx: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = rx.recv().await {
        let result = match event.dashboard_id() {
            Some(dashboard_id) => hub.broadcast_to_group(dashboard_id, &event),
            None => hub.broadcast_to_all(&event),
        };
        match result {
            Ok(delivered) => tracing::debug!("Sent {} to {} connections", event.name(), delivered),
            Err(e) => tracing::error!("Notification delivery failed: {}", e),
        }
    }
}
