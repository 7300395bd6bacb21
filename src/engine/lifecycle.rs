//! Authentication, runtime settings updates and shutdown coordination.

use super::VripperEngine;
use crate::auth::AuthService;
use crate::config::Config;
use crate::error::Result;
use std::time::Duration;

/// How long shutdown waits for cancelled units to unwind
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl VripperEngine {
    /// Log in again with the current settings
    ///
    /// Units submitted afterwards use the new session; units already
    /// submitted keep the one they were created with. Returns whether the
    /// forum accepted the login.
    pub async fn authenticate(&self) -> Result<bool> {
        let config = self.settings.current_snapshot();
        let session = AuthService::login(&config, self.transport.as_ref()).await?;
        let authenticated = session.authenticated;
        *self.session.write().await = session;
        Ok(authenticated)
    }

    /// Validate and publish new settings
    ///
    /// Units that have not started yet see the new values. The pool and the
    /// per-host limits follow the `connection` settings, and the session is
    /// renewed when the host or account settings changed.
    pub async fn update_settings(&self, config: Config) -> Result<()> {
        let previous = self.settings.current_snapshot();
        self.settings.update(config.clone())?;

        self.scheduler.resize(config.connection.max_concurrent_tasks);
        self.scheduler
            .set_host_limit(config.connection.max_threads_per_host);

        let account_changed = previous.viper.host != config.viper.host
            || previous.viper.login != config.viper.login
            || previous.viper.username != config.viper.username
            || previous.viper.password != config.viper.password;
        if account_changed {
            tracing::info!("Account settings changed, logging in again");
            self.authenticate().await?;
        }
        Ok(())
    }

    /// Wait until every task unit submitted so far has finished
    pub async fn drain(&self) {
        self.scheduler.drain().await;
    }

    /// Shut the engine down
    ///
    /// Stops accepting work, cancels queued and running units and waits for
    /// them to unwind. Later submissions fail with
    /// [`Error::ShuttingDown`](crate::Error::ShuttingDown).
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating shutdown");

        if !self.scheduler.shutdown(SHUTDOWN_TIMEOUT).await {
            tracing::warn!("Some tasks did not stop in time, proceeding with shutdown");
        }

        // The pool closes when the last engine clone is dropped
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
