use std::{path::PathBuf, time::Duration};

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Runtime settings shared by every session of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// How long a session may wait for a connection or a resume before it's reclaimed.
    pub session_timeout: Duration,

    /// Where to write files transferred to clients. Capture is off when `None`.
    pub save_files_dir: Option<PathBuf>,
}

impl ProxyConfig {
    pub const fn new(session_timeout: Duration, save_files_dir: Option<PathBuf>) -> Self {
        Self {
            session_timeout,
            save_files_dir,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT, None)
    }
}
