pub mod accrual;
pub mod aggregate;
pub mod analytics;
pub mod codes;
pub mod config;
pub mod directory;
pub mod error;
pub mod insight;
pub mod model;
pub mod segment;
pub mod service;
pub mod store;
pub mod trend;
pub mod types;
