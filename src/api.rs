//! HTTP API for the kiosk
//!
//! Session routes drive the conversation controller; visitor routes proxy
//! the visitor directory.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::directory::VisitorDirectory;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub directory: Arc<dyn VisitorDirectory>,
}

impl AppState {
    pub fn new(sessions: SessionManager, directory: Arc<dyn VisitorDirectory>) -> Self {
        Self {
            sessions: Arc::new(sessions),
            directory,
        }
    }
}
