// Read-side queries against the dashboard CRUD collaborator
use crate::domain::widget::{DashboardId, WidgetId, WidgetType};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;

pub const PUBLISHED: &str = "Published";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDefinition {
    pub id: WidgetId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub widget_type: String,
}

/// Authoritative dashboard representation as served by the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDefinition {
    pub id: DashboardId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub widgets: Vec<WidgetDefinition>,
}

impl DashboardDefinition {
    pub fn is_published(&self) -> bool {
        self.status == PUBLISHED
    }

    /// Widgets whose data accumulates as a series. Unknown types are not streaming.
    pub fn streaming_widget_ids(&self) -> HashSet<WidgetId> {
        self.widgets
            .iter()
            .filter(|w| {
                w.widget_type
                    .parse::<WidgetType>()
                    .is_ok_and(WidgetType::is_streaming)
            })
            .map(|w| w.id)
            .collect()
    }
}

/// Cache invalidation hooks. Each call refetches from the collaborator and
/// returns the fresh representation.
#[async_trait]
pub trait DashboardQueries: Send + Sync {
    async fn invalidate_dashboard(&self, dashboard_id: DashboardId) -> anyhow::Result<DashboardDefinition>;

    async fn invalidate_dashboard_list(&self) -> anyhow::Result<Vec<DashboardDefinition>>;
}
