// Application state for HTTP handlers
use crate::application::coordinator::SessionCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
}
