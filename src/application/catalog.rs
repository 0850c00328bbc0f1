// Dashboard catalog snapshot - slow-cadence view of published dashboards
use crate::application::catalog_repository::{
    CatalogError, DashboardCatalogRepository, PublishedDashboard,
};
use crate::domain::widget::{DashboardSnapshot, WidgetRef, WidgetType};
use std::sync::{Arc, RwLock};

/// Holds the current catalog as one immutable slice. Readers clone the
/// `Arc` and keep a consistent view for as long as they hold it; a refresh
/// swaps the whole slice.
pub struct DashboardCatalog {
    repository: Arc<dyn DashboardCatalogRepository>,
    current: RwLock<Arc<[DashboardSnapshot]>>,
}

impl DashboardCatalog {
    pub fn new(repository: Arc<dyn DashboardCatalogRepository>) -> Self {
        Self {
            repository,
            current: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn current(&self) -> Arc<[DashboardSnapshot]> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild the snapshot from the repository and swap it in.
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let published = self.repository.published_dashboards().await?;
        let snapshot: Arc<[DashboardSnapshot]> = Arc::from(map_snapshot(published));
        let count = snapshot.len();

        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;

        tracing::debug!("Dashboards refreshed: {} published", count);
        Ok(count)
    }
}

fn map_snapshot(published: Vec<PublishedDashboard>) -> Vec<DashboardSnapshot> {
    published
        .into_iter()
        .map(|dashboard| {
            let widgets = dashboard
                .widgets
                .into_iter()
                .filter_map(|widget| match widget.widget_type.parse::<WidgetType>() {
                    Ok(widget_type) => Some(WidgetRef {
                        dashboard_id: dashboard.id,
                        widget_id: widget.id,
                        widget_type,
                    }),
                    Err(source) => {
                        let e = CatalogError::UnknownWidgetType {
                            dashboard_id: dashboard.id,
                            widget_id: widget.id,
                            source,
                        };
                        tracing::warn!("{:#}", anyhow::Error::from(e));
                        None
                    }
                })
                .collect();

            DashboardSnapshot::new(dashboard.id, widgets)
        })
        .collect()
}
