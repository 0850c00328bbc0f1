// Client-side alert list
use crate::domain::events::AlertSeverity;
use crate::domain::widget::DashboardId;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedAlert {
    pub alert_id: Uuid,
    pub dashboard_id: DashboardId,
    pub severity: AlertSeverity,
    pub received_at: DateTime<Utc>,
}

/// Newest alert first.
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: Mutex<Vec<ReceivedAlert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, dashboard_id: DashboardId, alert_id: Uuid, severity: AlertSeverity) {
        let alert = ReceivedAlert {
            alert_id,
            dashboard_id,
            severity,
            received_at: Utc::now(),
        };
        self.lock().insert(0, alert);
    }

    /// Returns whether an alert was removed.
    pub fn dismiss(&self, alert_id: Uuid) -> bool {
        let mut alerts = self.lock();
        let before = alerts.len();
        alerts.retain(|a| a.alert_id != alert_id);
        alerts.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn alerts(&self) -> Vec<ReceivedAlert> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ReceivedAlert>> {
        self.alerts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_then_dismiss_and_clear() {
        let store = AlertStore::new();
        let dashboard = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        store.add(dashboard, first, AlertSeverity::Info);
        store.add(dashboard, second, AlertSeverity::Critical);

        let ids: Vec<Uuid> = store.alerts().iter().map(|a| a.alert_id).collect();
        assert_eq!(ids, vec![second, first]);

        assert!(store.dismiss(first));
        assert!(!store.dismiss(first));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }
}
