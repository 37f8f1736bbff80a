use std::time::Duration;

/// Listen backlog applied to freshly bound sockets.
pub const DEFAULT_BACKLOG: i32 = 1024;

/// Knobs for [`acquire_listener`](crate::acquire_listener).
///
/// The defaults are what every server wants: a backlog of 1024 and an
/// abortive close (`SO_LINGER` on, zero timeout). None of these settings touch
/// an inherited socket, which the service manager has already configured.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListenerConfig {
    /// Print a `bind <fd> <host>:<port>` line for every socket that gets
    /// bound.
    pub verbose: bool,
    /// Passed to `listen(2)`.
    pub backlog: i32,
    /// `SO_LINGER` timeout. Lingering is always enabled.
    pub linger: Duration,
    /// Remove `LISTEN_PID`, `LISTEN_FDS` and `LISTEN_FDNAMES` from the
    /// environment once they were read, so children don't see them.
    pub unset_environment: bool,
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn unset_environment(mut self, unset_environment: bool) -> Self {
        self.unset_environment = unset_environment;
        self
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            backlog: DEFAULT_BACKLOG,
            linger: Duration::ZERO,
            unset_environment: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_policy() {
        let config = ListenerConfig::default();
        assert!(!config.verbose);
        assert_eq!(config.backlog, 1024);
        assert_eq!(config.linger, Duration::ZERO);
        assert!(!config.unset_environment);
    }

    #[test]
    fn builder_overrides() {
        let config = ListenerConfig::new()
            .verbose(true)
            .backlog(16)
            .linger(Duration::from_secs(2));
        assert!(config.verbose);
        assert_eq!(config.backlog, 16);
        assert_eq!(config.linger.as_secs(), 2);
    }
}
