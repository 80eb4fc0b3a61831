use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use gamerelay_proto::version::GameVersion;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::timer::TaskGuard;

use super::{EventSender, ServerEvent};

/// Raw OS codes for running out of file descriptors, process-wide and system-wide.
const EMFILE: i32 = 24;
const ENFILE: i32 = 23;

/// An accept loop bound to one port. Dropping it stops accepting.
#[derive(Debug)]
pub struct ListeningSocket {
    port: u16,
    version: GameVersion,
    default_destination: Option<SocketAddr>,
    local_addr: SocketAddr,
    _accept_task: TaskGuard,
}

impl ListeningSocket {
    /// Binds on all interfaces. Port 0 binds an ephemeral port, see [`ListeningSocket::port`].
    pub fn bind(port: u16, version: GameVersion, default_destination: Option<SocketAddr>, events: EventSender) -> io::Result<Self> {
        let std_listener = std::net::TcpListener::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port))?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;
        let local_addr = listener.local_addr()?;
        let port = local_addr.port();

        let handle = tokio::task::spawn_local(async move {
            accept_loop(port, listener, events).await;
        });

        Ok(Self {
            port,
            version,
            default_destination,
            local_addr,
            _accept_task: TaskGuard::new(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn version(&self) -> GameVersion {
        self.version
    }

    pub fn default_destination(&self) -> Option<SocketAddr> {
        self.default_destination
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Whether an accept error only concerns the connection being accepted.
fn is_per_connection_error(error: &io::Error) -> bool {
    match error.kind() {
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted | ErrorKind::WouldBlock => true,
        _ => matches!(error.raw_os_error(), Some(EMFILE | ENFILE)),
    }
}

async fn accept_loop(port: u16, listener: TcpListener, events: EventSender) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Accepted connection from {peer} on port {port}");
                if events.send(ServerEvent::Accepted { port, stream, peer }).is_err() {
                    return;
                }
            }
            Err(error) if is_per_connection_error(&error) => {
                warn!("Discarding connection on port {port}: {error}");
                if error.raw_os_error().is_some_and(|code| code == EMFILE || code == ENFILE) {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
            Err(error) => {
                let _ = events.send(ServerEvent::ListenerFailed { port, error });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_error_classification() {
        assert!(is_per_connection_error(&io::Error::from(ErrorKind::ConnectionReset)));
        assert!(is_per_connection_error(&io::Error::from_raw_os_error(EMFILE)));
        assert!(!is_per_connection_error(&io::Error::from(ErrorKind::InvalidInput)));
    }
}
