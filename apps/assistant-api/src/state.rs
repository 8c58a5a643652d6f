//! Application state management

use domain_assistant::PromptGateway;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PromptGateway>,
}
