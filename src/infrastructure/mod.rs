// Infrastructure layer - transports and configuration
pub mod config;
pub mod connector;
pub mod polling;
pub mod streaming;
