// HTTP adapter for the dashboard CRUD API
use crate::application::catalog_repository::{
    DashboardCatalogRepository, PublishedDashboard, PublishedWidget,
};
use crate::client::queries::{DashboardDefinition, DashboardQueries, PUBLISHED};
use crate::domain::widget::DashboardId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const PAGE_SIZE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpDashboardRepository {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedResponse<T> {
    items: Vec<T>,
    #[serde(default)]
    has_next_page: bool,
}

impl HttpDashboardRepository {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Every request, body included, fails once `timeout` has elapsed.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build dashboard API client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn dashboards_url(&self) -> String {
        format!("{}/api/dashboards", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Dashboard API request failed with status {}: {}", status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Walk every page of the list endpoint, optionally filtered by status.
    async fn list(&self, status: Option<&str>) -> Result<Vec<DashboardDefinition>> {
        let url = self.dashboards_url();
        let mut dashboards = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(status) = status {
                query.push(("status", status.to_string()));
            }

            let response: PagedResponse<DashboardDefinition> = self.get_json(&url, &query).await?;
            dashboards.extend(response.items);

            if !response.has_next_page {
                break;
            }
            page += 1;
        }

        Ok(dashboards)
    }
}

fn to_published(definitions: Vec<DashboardDefinition>) -> Vec<PublishedDashboard> {
    definitions
        .into_iter()
        .filter(DashboardDefinition::is_published)
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
        .collect()
}

#[async_trait]
impl DashboardCatalogRepository for HttpDashboardRepository {
    async fn published_dashboards(&self) -> Result<Vec<PublishedDashboard>> {
        let definitions = self.list(Some(PUBLISHED)).await?;
        Ok(to_published(definitions))
    }
}

#[async_trait]
impl DashboardQueries for HttpDashboardRepository {
    async fn invalidate_dashboard(&self, dashboard_id: DashboardId) -> Result<DashboardDefinition> {
        let url = format!("{}/{}", self.dashboards_url(), dashboard_id);
        self.get_json(&url, &[]).await
    }

    async fn invalidate_dashboard_list(&self) -> Result<Vec<DashboardDefinition>> {
        self.list(None).await
    }
}
