use std::sync::Arc;

use prism_search::IndexSession;
use tokio::sync::Mutex;

/// Shared handler state. The session lock serialises folder switches and
/// configuration reloads.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<IndexSession>>,
}

impl AppState {
    pub fn new(session: IndexSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}
