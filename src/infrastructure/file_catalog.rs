// TOML file catalog repository
use crate::application::catalog_repository::{
    DashboardCatalogRepository, PublishedDashboard, PublishedWidget,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use uuid::Uuid;

const PUBLISHED: &str = "Published";

/// Re-reads the file on every refresh so edits show up on the next cycle.
#[derive(Debug, Clone)]
pub struct FileCatalogRepository {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    dashboards: Vec<DashboardEntry>,
}

#[derive(Debug, Deserialize)]
struct DashboardEntry {
    id: Uuid,
    status: String,
    #[serde(default)]
    widgets: Vec<WidgetEntry>,
}

#[derive(Debug, Deserialize)]
struct WidgetEntry {
    id: Uuid,
    #[serde(rename = "type")]
    widget_type: String,
}

impl FileCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn parse_catalog(text: &str) -> Result<Vec<PublishedDashboard>> {
    let file: CatalogFile = toml::from_str(text).context("Invalid catalog file")?;

    Ok(file
        .dashboards
        .into_iter()
        .filter(|d| d.status == PUBLISHED)
        .map(|d| PublishedDashboard {
            id: d.id,
            widgets: d
                .widgets
                .into_iter()
                .map(|w| PublishedWidget {
                    id: w.id,
                    widget_type: w.widget_type,
                })
                .collect(),
        })
        .collect())
}

#[async_trait]
impl DashboardCatalogRepository for FileCatalogRepository {
    async fn published_dashboards(&self) -> Result<Vec<PublishedDashboard>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read catalog {}", self.path.display()))?;
        parse_catalog(&text)
    }
}
