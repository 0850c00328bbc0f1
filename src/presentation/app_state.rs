// Application state for HTTP and WebSocket handlers
use crate::application::notifier::DashboardNotifier;
use crate::infrastructure::hub::GroupHub;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<GroupHub>,
    pub notifier: DashboardNotifier,
}
