//! Engine facade wiring the task scheduler to its collaborators.
//!
//! The `VripperEngine` struct and its methods are organized by concern:
//! - [`producers`] - Operations that submit task units
//! - [`control`] - Stopping and restarting the downloads of a post
//! - [`lifecycle`] - Authentication, settings updates, drain and shutdown

mod control;
mod lifecycle;
mod producers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::auth::{AuthService, AuthSession};
use crate::config::Config;
use crate::db::{Database, LogFilter};
use crate::error::Result;
use crate::event_log::EventLog;
use crate::extract::LinkExtractor;
use crate::gauge::ActiveTasks;
use crate::scheduler::TaskScheduler;
use crate::settings::SettingsService;
use crate::tasks::TaskContext;
use crate::transport::{HttpTransport, Transport};
use crate::types::{LogEntry, TaskStats};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct VripperEngine {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored posts and images
    pub db: Arc<Database>,
    /// Event log (SQLite plus live broadcast)
    pub(crate) event_log: EventLog,
    /// Source of configuration snapshots
    pub(crate) settings: SettingsService,
    /// Bounded pool running task units
    pub(crate) scheduler: TaskScheduler,
    /// Executes requests, also used for the login
    pub(crate) transport: Arc<dyn Transport>,
    /// Session handed to newly created task units
    pub(crate) session: Arc<RwLock<AuthSession>>,
}

impl VripperEngine {
    /// Create an engine sending requests through reqwest
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the event log, settings service, gauge and scheduler
    /// - Logs in when `viper.login` is enabled
    pub async fn new(config: Config, extractor: Arc<dyn LinkExtractor>) -> Result<Self> {
        Self::with_transport(config, extractor, Arc::new(HttpTransport::new())).await
    }

    /// Create an engine sending requests through `transport`
    pub async fn with_transport(
        config: Config,
        extractor: Arc<dyn LinkExtractor>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let settings = SettingsService::new(config.clone());
        let event_log = EventLog::new(db.clone(), settings.clone());

        let ctx = TaskContext {
            settings: settings.clone(),
            transport: transport.clone(),
            event_log: Arc::new(event_log.clone()),
            posts: db.clone(),
            extractor,
            gauge: ActiveTasks::new(),
        };
        let scheduler = TaskScheduler::new(ctx, config.connection.max_concurrent_tasks);

        let session = AuthService::login(&config, transport.as_ref()).await?;

        tracing::info!(
            host = %config.viper.host,
            max_concurrent_tasks = config.connection.max_concurrent_tasks,
            authenticated = session.authenticated,
            "Engine started"
        );

        Ok(Self {
            db,
            event_log,
            settings,
            scheduler,
            transport,
            session: Arc::new(RwLock::new(session)),
        })
    }

    /// Subscribe to newly appended event log entries
    ///
    /// Multiple subscribers are supported; each receives every entry.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.event_log.subscribe()
    }

    /// The configuration snapshot in effect right now
    pub fn settings(&self) -> Arc<Config> {
        self.settings.current_snapshot()
    }

    /// Number of task units currently executing
    pub fn running_count(&self) -> usize {
        self.scheduler.in_flight_count()
    }

    /// Running and queued task counts
    pub fn stats(&self) -> TaskStats {
        self.scheduler.stats()
    }

    /// Whether the current session is logged in
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.authenticated
    }

    /// Stored event log entries matching `filter`, newest first
    pub async fn events(
        &self,
        filter: &LogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LogEntry>> {
        self.event_log.query(filter, limit, offset).await
    }

    /// Number of stored event log entries matching `filter`
    pub async fn event_count(&self, filter: &LogFilter) -> Result<i64> {
        self.event_log.count(filter).await
    }

    /// Delete every stored event log entry
    pub async fn clear_events(&self) -> Result<u64> {
        self.event_log.clear().await
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on `api.bind_address` of the current settings.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let engine = self.clone();
        let config = self.settings.current_snapshot();

        tokio::spawn(async move { crate::api::start_api_server(engine, config).await })
    }
}
