// Application layer - Session orchestration and the transport seam
pub mod animation;
pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod reconnect;
pub mod transport;
