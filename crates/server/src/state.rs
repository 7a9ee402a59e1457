use std::sync::Arc;

use service::auth::AuthProvider;
use service::prompts::PromptLibrary;
use service::session::SessionRegistry;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub registry: Arc<SessionRegistry>,
    pub prompts: PromptLibrary,
}

impl AppState {
    /// Wire the state and start tearing sessions down on sign-out.
    pub fn new(auth: Arc<dyn AuthProvider>, registry: Arc<SessionRegistry>, prompts: PromptLibrary) -> Self {
        registry.clone().spawn_teardown(auth.subscribe());
        Self { auth, registry, prompts }
    }
}
