// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_catalog;
pub mod http_catalog;
pub mod hub;
pub mod ws_connector;
