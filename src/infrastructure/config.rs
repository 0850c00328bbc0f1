use serde::Deserialize;
use std::time::Duration;

use crate::application::scheduler::SchedulerSettings;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RealtimeConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Outbound frames queued per WebSocket connection before drops start
    pub client_buffer: usize,
    pub notify_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            client_buffer: 256,
            notify_buffer: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationSettings {
    pub tick_interval_ms: u64,
    pub refresh_interval_secs: u64,
    /// Longest a catalog refresh may hold up a tick
    pub refresh_timeout_secs: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            refresh_interval_secs: 30,
            refresh_timeout_secs: 5,
        }
    }
}

impl SimulationSettings {
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            refresh_timeout: Duration::from_secs(self.refresh_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    #[default]
    File,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogSettings {
    pub source: CatalogSource,
    pub path: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            source: CatalogSource::File,
            path: "config/catalog.toml".to_string(),
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl CatalogSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub api_base_url: String,
    pub backoff_ms: Vec<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/hubs/dashboard".to_string(),
            api_base_url: "http://127.0.0.1:5000".to_string(),
            backoff_ms: vec![0, 1000, 2000, 5000, 10000, 30000],
            max_reconnect_attempts: None,
        }
    }
}

impl ClientConfig {
    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_ms.iter().copied().map(Duration::from_millis).collect()
    }
}

pub fn load_realtime_config() -> anyhow::Result<RealtimeConfig> {
    load("config/realtime", "REALTIME")
}

pub fn load_client_config() -> anyhow::Result<ClientConfig> {
    load("config/client", "WATCH")
}

fn load<T: serde::de::DeserializeOwned>(file: &str, env_prefix: &str) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(file).required(false))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("backoff_ms"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml<T: serde::de::DeserializeOwned>(text: &str) -> T {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_realtime_defaults_apply_without_file() {
        let config: RealtimeConfig = from_toml("");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.client_buffer, 256);
        assert_eq!(config.catalog.source, CatalogSource::File);

        let settings = config.simulation.scheduler_settings();
        assert_eq!(settings, SchedulerSettings::default());
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config: RealtimeConfig = from_toml(
            r#"
            [simulation]
            tick_interval_ms = 250

            [catalog]
            source = "http"
            base_url = "http://crud:5000"
            "#,
        );
        assert_eq!(config.simulation.tick_interval_ms, 250);
        assert_eq!(config.simulation.refresh_interval_secs, 30);
        assert_eq!(config.catalog.source, CatalogSource::Http);
        assert_eq!(config.catalog.path, "config/catalog.toml");
        assert_eq!(config.catalog.request_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.simulation.scheduler_settings().refresh_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_client_backoff_defaults() {
        let config: ClientConfig = from_toml("max_reconnect_attempts = 3");
        assert_eq!(config.max_reconnect_attempts, Some(3));
        assert_eq!(config.backoff()[3], Duration::from_secs(5));
        assert_eq!(config.backoff().len(), 6);
    }
}
