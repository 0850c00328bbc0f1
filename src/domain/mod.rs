// Domain layer - Core business models
pub mod connection;
pub mod events;
pub mod metric;
pub mod payload;
pub mod widget;
