//! Admin HTTP API
//!
//! Read-only views of the session store for operations staff.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::SessionStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub operator_channel_configured: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, operator_channel_configured: bool) -> Self {
        Self {
            store,
            operator_channel_configured,
        }
    }
}
