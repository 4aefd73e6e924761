// Domain layer - Telemetry data, history and smoothing
pub mod command;
pub mod gauge;
pub mod history;
pub mod session;
pub mod smoothing;
pub mod telemetry;
