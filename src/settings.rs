//! Settings service: publishes immutable configuration snapshots.
//!
//! Task units call [`SettingsService::current_snapshot`] at the moment they
//! decide whether to act, so an update made after a unit was submitted but
//! before it started is honoured.

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// Holds the current configuration snapshot (cloneable, all clones share state)
#[derive(Clone)]
pub struct SettingsService {
    tx: Arc<watch::Sender<Arc<Config>>>,
}

impl SettingsService {
    /// Create a service publishing `config` as the first snapshot
    pub fn new(config: Config) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { tx: Arc::new(tx) }
    }

    /// The snapshot in effect right now
    ///
    /// Never blocks on writers for longer than the pointer swap.
    pub fn current_snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.tx.borrow())
    }

    /// Validate and publish a new snapshot
    ///
    /// Units that already read the previous snapshot keep using it.
    pub fn update(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.tx.send_replace(Arc::new(config));
        tracing::info!("Settings updated");
        Ok(())
    }

    /// Receive a notification whenever a new snapshot is published
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.tx.subscribe()
    }
}
