//! Collaborators shared by every task unit.

use crate::event_log::EventLogStore;
use crate::extract::LinkExtractor;
use crate::gauge::ActiveTasks;
use crate::posts::PostStore;
use crate::settings::SettingsService;
use crate::transport::Transport;
use std::sync::Arc;

/// Everything a task unit needs besides its own inputs
///
/// Built once by the engine and shared by all units.
#[derive(Clone)]
pub struct TaskContext {
    /// Source of configuration snapshots
    pub settings: SettingsService,
    /// Executes requests
    pub transport: Arc<dyn Transport>,
    /// Destination of log entries
    pub event_log: Arc<dyn EventLogStore>,
    /// Destination of scan results, metadata and image status
    pub posts: Arc<dyn PostStore>,
    /// Page parser
    pub extractor: Arc<dyn LinkExtractor>,
    /// Running unit count
    pub gauge: ActiveTasks,
}
