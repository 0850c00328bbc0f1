// Real-time wire events exchanged between the hub and its clients
use super::widget::{DashboardId, WidgetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// One tick worth of generated payloads for a single dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDataBundle {
    pub dashboard_id: DashboardId,
    pub widgets: HashMap<WidgetId, serde_json::Value>,
}

/// Server to client frame: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    DashboardUpdated {
        dashboard_id: DashboardId,
    },
    WidgetAdded {
        dashboard_id: DashboardId,
        widget_id: WidgetId,
    },
    WidgetRemoved {
        dashboard_id: DashboardId,
        widget_id: WidgetId,
    },
    AlertTriggered {
        dashboard_id: DashboardId,
        alert_id: Uuid,
        severity: AlertSeverity,
    },
    WidgetDataUpdated(WidgetDataBundle),
    DashboardListChanged,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::DashboardUpdated { .. } => "dashboard-updated",
            ServerEvent::WidgetAdded { .. } => "widget-added",
            ServerEvent::WidgetRemoved { .. } => "widget-removed",
            ServerEvent::AlertTriggered { .. } => "alert-triggered",
            ServerEvent::WidgetDataUpdated(_) => "widget-data-updated",
            ServerEvent::DashboardListChanged => "dashboard-list-changed",
        }
    }

    /// Group the event is scoped to; `None` for catalog-wide events.
    pub fn dashboard_id(&self) -> Option<DashboardId> {
        match self {
            ServerEvent::DashboardUpdated { dashboard_id }
            | ServerEvent::WidgetAdded { dashboard_id, .. }
            | ServerEvent::WidgetRemoved { dashboard_id, .. }
            | ServerEvent::AlertTriggered { dashboard_id, .. } => Some(*dashboard_id),
            ServerEvent::WidgetDataUpdated(bundle) => Some(bundle.dashboard_id),
            ServerEvent::DashboardListChanged => None,
        }
    }
}

/// Client to server frame: `{"action": "join" | "leave", "dashboardId": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    Join { dashboard_id: DashboardId },
    Leave { dashboard_id: DashboardId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widget_data_frame_shape() {
        let dashboard_id = Uuid::new_v4();
        let widget_id = Uuid::new_v4();
        let event = ServerEvent::WidgetDataUpdated(WidgetDataBundle {
            dashboard_id,
            widgets: HashMap::from([(widget_id, json!({ "value": 3 }))]),
        });

        let frame = serde_json::to_value(&event).unwrap();
        assert_eq!(
            frame,
            json!({
                "event": "widget-data-updated",
                "data": {
                    "dashboardId": dashboard_id.to_string(),
                    "widgets": { widget_id.to_string(): { "value": 3 } }
                }
            })
        );
        assert_eq!(frame["event"], event.name());
    }

    #[test]
    fn test_list_changed_has_no_payload() {
        let frame = serde_json::to_value(ServerEvent::DashboardListChanged).unwrap();
        assert_eq!(frame, json!({ "event": "dashboard-list-changed" }));

        let parsed: ServerEvent =
            serde_json::from_str(r#"{"event":"dashboard-list-changed"}"#).unwrap();
        assert_eq!(parsed, ServerEvent::DashboardListChanged);
        assert_eq!(parsed.dashboard_id(), None);
    }

    #[test]
    fn test_alert_frame_uses_camel_case_fields() {
        let dashboard_id = Uuid::new_v4();
        let alert_id = Uuid::new_v4();
        let frame = serde_json::to_value(ServerEvent::AlertTriggered {
            dashboard_id,
            alert_id,
            severity: AlertSeverity::Critical,
        })
        .unwrap();

        assert_eq!(frame["event"], "alert-triggered");
        assert_eq!(frame["data"]["alertId"], alert_id.to_string());
        assert_eq!(frame["data"]["severity"], "Critical");
    }

    #[test]
    fn test_client_command_parses() {
        let dashboard_id = Uuid::new_v4();
        let raw = format!(r#"{{"action":"join","dashboardId":"{dashboard_id}"}}"#);
        let command: ClientCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(command, ClientCommand::Join { dashboard_id });

        assert!(serde_json::from_str::<ClientCommand>(r#"{"action":"shout"}"#).is_err());
    }
}
