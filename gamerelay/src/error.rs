use std::{io, net::SocketAddr};

use gamerelay_link_sm::InvalidEvent;
use gamerelay_proto::frame::FrameError;
use thiserror::Error;

/// A malformed frame or handshake. Always scoped to the channel it arrived on.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("bad frame: {0}")]
    Frame(#[from] FrameError),

    #[error("bad payload in command {command:#04x}: {source}")]
    Command { command: u16, source: io::Error },

    #[error("expected command {expected:#04x}, got {actual:#04x}")]
    UnexpectedCommand { expected: u16, actual: u16 },

    #[error("handshake names no destination and the listener has no default")]
    NoDestination,

    #[error("handshake resumes session {0:#x}, which doesn't exist")]
    UnknownSession(u64),

    #[error("handshake license serial {actual:#010x} doesn't match session license {expected:#010x}")]
    LicenseMismatch { expected: u32, actual: u32 },
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not connect to {destination:?}: {source}")]
    Connect { destination: Option<SocketAddr>, source: io::Error },

    #[error("channel closed")]
    ChannelClosed,

    #[error("channel error: {0}")]
    Channel(io::Error),

    #[error("session timed out while detached")]
    TimeoutExpired,

    #[error("file {basename} has {remaining} bytes left but got a {chunk}-byte chunk")]
    CaptureOverrun { basename: String, remaining: u32, chunk: usize },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidEvent),

    #[error("port {0} is already being listened on")]
    PortInUse(u16),

    #[error("no listener on port {0}")]
    NoListener(u16),

    #[error("no session with id {0:#x}")]
    UnknownSession(u64),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// Builds the error a channel's reader reports when it stops, `None` meaning a clean EOF.
    pub fn from_channel_close(error: Option<io::Error>) -> Self {
        match error {
            Some(error) => Self::Channel(error),
            None => Self::ChannelClosed,
        }
    }
}
