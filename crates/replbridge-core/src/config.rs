//! Centralized configuration for replbridge.
//!
//! Protocol constants live on [`ProtocolConfig`]; everything that can differ
//! between two engines in the same host process lives on [`EngineConfig`].

use std::time::Duration;

/// Wire-level constants shared by every guest.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Prefix of every sentinel stamp. Guests embed it in their own quoting.
    pub const SENTINEL_PREFIX: &'static str = "replbridge-sentinel:";
    /// Grace period between the termination fragment and a forced kill.
    pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);
    /// Poll interval while waiting for a guest process to exit.
    pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Grace period between SIGTERM and SIGKILL once a kill is needed.
    pub const KILL_GRACE: Duration = Duration::from_millis(500);
}

/// Per-engine configuration.
///
/// Replaces the process-wide debug toggle of older bridges: two engines in
/// one host can log at different verbosity.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Log every write and every line read at `debug` level.
    pub verbose_logging: bool,
    /// How long `close()` waits for the guest to exit before killing it.
    pub close_grace: Duration,
    /// Upper bound on a single blocking read. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Maximum number of banner lines tolerated during the handshake.
    pub handshake_line_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            close_grace: ProtocolConfig::DEFAULT_CLOSE_GRACE,
            read_timeout: None,
            handshake_line_limit: None,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable per-request traffic logging.
    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// Set the close grace period.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Bound every blocking read.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Fail the handshake if the banner is longer than `limit` lines.
    pub fn with_handshake_line_limit(mut self, limit: usize) -> Self {
        self.handshake_line_limit = Some(limit);
        self
    }
}
