// Presentation layer - HTTP surface over the telemetry session
pub mod app_state;
pub mod handlers;
