use std::{io, net::SocketAddr};

use gamerelay_link_sm::TimerToken;
use tokio::{net::TcpStream, sync::mpsc};

use crate::channel::ChannelId;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Everything the server's event loop reacts to. Tasks doing IO only ever talk to the server
/// through these.
#[derive(Debug)]
pub enum ServerEvent {
    /// A listener accepted a connection.
    Accepted { port: u16, stream: TcpStream, peer: SocketAddr },

    /// A listener stopped accepting for good.
    ListenerFailed { port: u16, error: io::Error },

    /// Bytes were read from a channel.
    ChannelInput { channel: ChannelId, data: Vec<u8> },

    /// A channel hit EOF (`error` is `None`) or failed. Sent once per channel at most.
    ChannelClosed { channel: ChannelId, error: Option<io::Error> },

    /// A session's outbound connection attempt finished.
    ConnectCompleted {
        session_id: u64,
        destination: Option<SocketAddr>,
        result: io::Result<TcpStream>,
    },

    /// A session's timeout elapsed.
    TimeoutFired { session_id: u64, token: TimerToken },
}
