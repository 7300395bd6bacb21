//! # vripper-engine
//!
//! Task orchestration engine for a forum image-gallery downloader.
//!
//! Every network action (thread scan, metadata fetch, image download, "thanks"
//! on a post) is a task unit run by a bounded [`TaskScheduler`]. While a unit
//! runs it is counted on the [`ActiveTasks`] gauge. It reads the settings in
//! effect when it starts, and any failure ends up as one entry in the
//! [`EventLog`] instead of reaching the caller.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vripper_engine::{Config, LinkExtractor, Post, VripperEngine};
//!
//! # async fn example(extractor: Arc<dyn LinkExtractor>, post: Post) -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.viper.login = true;
//! config.viper.username = "someone".to_string();
//! config.viper.password = "secret".to_string();
//! config.viper.thanks = true;
//!
//! let engine = VripperEngine::new(config, extractor).await?;
//!
//! let mut events = engine.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(entry) = events.recv().await {
//!         println!("{} {}: {}", entry.log_type, entry.status, entry.message);
//!     }
//! });
//!
//! engine
//!     .download_post(post, vec!["https://img.example/1.jpg".to_string()])
//!     .await?;
//! engine.drain().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Forum login
pub mod auth;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Engine facade
pub mod engine;
/// Error types
pub mod error;
/// Event log
pub mod event_log;
/// Page parsing seam
pub mod extract;
/// Active-task gauge
pub mod gauge;
/// Post persistence seam
pub mod posts;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded task scheduler
pub mod scheduler;
/// Runtime settings snapshots
pub mod settings;
/// Task units
pub mod tasks;
/// HTTP transport
pub mod transport;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use auth::{AuthService, AuthSession};
pub use config::Config;
pub use db::{Database, LogFilter};
pub use engine::VripperEngine;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus, TransportError};
pub use event_log::{EventLog, EventLogStore};
pub use extract::LinkExtractor;
pub use gauge::{ActiveTasks, TaskGuard};
pub use posts::PostStore;
pub use scheduler::TaskScheduler;
pub use settings::SettingsService;
pub use tasks::{Task, TaskContext, TaskOutcome, TaskUnit};
pub use transport::{AuthContext, HttpTransport, PreparedRequest, Response, Transport};
pub use types::{
    Image, ImageStatus, LogEntry, LogStatus, LogType, Metadata, NewLogEntry, Post, TaskStats,
    ThreadItem, ThreadLink,
};

/// Run the engine until a termination signal arrives, then shut it down.
///
/// Listens for Ctrl+C everywhere and for SIGTERM on Unix.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vripper_engine::{Config, LinkExtractor, VripperEngine, run_with_shutdown};
///
/// # async fn example(extractor: Arc<dyn LinkExtractor>) -> Result<(), Box<dyn std::error::Error>> {
/// let engine = VripperEngine::new(Config::default(), extractor).await?;
/// run_with_shutdown(engine).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(engine: VripperEngine) -> Result<()> {
    wait_for_signal().await;
    engine.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                result = tokio::signal::ctrl_c() => log_ctrl_c(result),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            log_ctrl_c(tokio::signal::ctrl_c().await);
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
