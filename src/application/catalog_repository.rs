// Repository trait for the published dashboard catalog
use crate::domain::widget::{DashboardId, UnknownWidgetType, WidgetId};
use async_trait::async_trait;

/// A widget as reported by the persistence collaborator; the type is still
/// the raw name so unknown kinds can be skipped during mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedWidget {
    pub id: WidgetId,
    pub widget_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDashboard {
    pub id: DashboardId,
    pub widgets: Vec<PublishedWidget>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("widget {widget_id} on dashboard {dashboard_id} skipped")]
    UnknownWidgetType {
        dashboard_id: DashboardId,
        widget_id: WidgetId,
        #[source]
        source: UnknownWidgetType,
    },
}

#[async_trait]
pub trait DashboardCatalogRepository: Send + Sync {
    /// All dashboards currently in the published state, with their widgets
    async fn published_dashboards(&self) -> anyhow::Result<Vec<PublishedDashboard>>;
}
