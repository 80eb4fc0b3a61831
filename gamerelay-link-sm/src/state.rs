use std::fmt;

/// The lifecycle states of a linked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SessionState {
    /// The session exists but has no destination channel, and no outbound connection was started
    /// yet. A client channel may or may not be attached.
    #[default]
    ClientOnly,

    /// An outbound connection to the destination is in progress.
    Connecting,

    /// Both channels are attached and frames are being forwarded in both directions.
    Relaying,

    /// The client channel is gone. The session waits for a client to resume it, or for the
    /// timeout to expire. The destination channel may still be attached.
    ClientDetached,

    /// The destination channel is gone while the client channel is still attached. The session
    /// waits for a new destination channel, or for the timeout to expire.
    ServerDetached,

    /// Terminal state. The session must be removed from the registry and all of its resources
    /// released.
    Closed,
}

impl SessionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::ClientDetached | Self::ServerDetached)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientOnly => write!(f, "CLIENT_ONLY"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Relaying => write!(f, "RELAYING"),
            Self::ClientDetached => write!(f, "CLIENT_DETACHED"),
            Self::ServerDetached => write!(f, "SERVER_DETACHED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// One of the two ends of a linked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The original game client.
    Client,

    /// The destination server (or the next intermediary).
    Server,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// Identifies one arming of a session's timeout. Every time the timeout is armed a new token is
/// issued, so a timer that fires after it was replaced or canceled can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Why a session went to [`SessionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The outbound connection to the destination failed.
    ConnectFailed,

    /// The session timed out while waiting for a connection or a resume.
    TimeoutExpired,

    /// The session was explicitly deleted.
    Deleted,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::TimeoutExpired => write!(f, "timeout expired"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}
