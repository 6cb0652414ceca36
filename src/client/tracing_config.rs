//! Tracing configuration for GBXRemote client operations.
//!
//! [`TracingConfig`] controls the level of the span each client operation
//! opens and whether an elapsed-time event is recorded when it completes.

use tracing::Level;

/// Controls tracing span levels and per-command timing for client operations.
///
/// Lifecycle operations (`connect`, `close`) default to `INFO`. `execute`
/// runs once per request and defaults to `DEBUG`. Timing is off for every
/// operation until enabled.
///
/// When timing is enabled for an operation, an event recording `elapsed_us`
/// is emitted inside its span as the operation completes.
///
/// # Examples
///
/// ```
/// use gbxremote::client::TracingConfig;
/// use tracing::Level;
///
/// let config = TracingConfig::default()
///     .with_connect_timing(true)
///     .with_execute_level(Level::INFO);
/// let _ = config;
/// ```
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) connect_level: Level,
    pub(crate) execute_level: Level,
    pub(crate) close_level: Level,
    pub(crate) connect_timing: bool,
    pub(crate) execute_timing: bool,
    pub(crate) close_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            connect_level: Level::INFO,
            execute_level: Level::DEBUG,
            close_level: Level::INFO,
            connect_timing: false,
            execute_timing: false,
            close_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the tracing level for the `connect` operation.
    #[must_use]
    pub fn with_connect_level(mut self, level: Level) -> Self {
        self.connect_level = level;
        self
    }

    /// Enable or disable per-command timing for `connect`.
    #[must_use]
    pub fn with_connect_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self
    }

    /// Set the tracing level for `execute` and the calls built on it.
    #[must_use]
    pub fn with_execute_level(mut self, level: Level) -> Self {
        self.execute_level = level;
        self
    }

    /// Enable or disable per-command timing for `execute`.
    #[must_use]
    pub fn with_execute_timing(mut self, enabled: bool) -> Self {
        self.execute_timing = enabled;
        self
    }

    /// Set the tracing level for the `close` operation.
    #[must_use]
    pub fn with_close_level(mut self, level: Level) -> Self {
        self.close_level = level;
        self
    }

    /// Enable or disable per-command timing for `close`.
    #[must_use]
    pub fn with_close_timing(mut self, enabled: bool) -> Self {
        self.close_timing = enabled;
        self
    }

    /// Set the tracing level for all operations at once.
    ///
    /// # Examples
    ///
    /// ```
    /// use gbxremote::client::TracingConfig;
    /// use tracing::Level;
    ///
    /// let config = TracingConfig::default().with_all_levels(Level::TRACE);
    /// let _ = config;
    /// ```
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.connect_level = level;
        self.execute_level = level;
        self.close_level = level;
        self
    }

    /// Enable or disable per-command timing for all operations at once.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.connect_timing = enabled;
        self.execute_timing = enabled;
        self.close_timing = enabled;
        self
    }
}
