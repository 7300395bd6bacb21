//! Application state for the API server

use crate::VripperEngine;
use std::sync::Arc;

/// Shared state handed to every route handler (cloned per request)
#[derive(Clone)]
pub struct AppState {
    /// The running engine; settings are read from it on every request
    pub engine: Arc<VripperEngine>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(engine: Arc<VripperEngine>) -> Self {
        Self { engine }
    }
}
