// Application layer - Catalog, generation, scheduling and notification services
pub mod catalog;
pub mod catalog_repository;
pub mod generator;
pub mod notifier;
pub mod scheduler;
