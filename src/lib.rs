pub mod analyzers;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod forecast;
pub mod infra;
pub mod loader;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod store;
