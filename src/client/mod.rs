// Client layer - Connection, subscriptions and local view state for dashboard viewers
pub mod alerts;
pub mod connection;
pub mod queries;
pub mod subscription;
pub mod view_cache;
