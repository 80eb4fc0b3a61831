use std::{fmt, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use tracing::{debug, trace};

use crate::{
    server::{EventSender, ServerEvent},
    timer::TaskGuard,
};

const READ_BUFFER_SIZE: usize = 0x4000;

/// Identifies a channel for the whole lifetime of the server. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One duplex connection. A reader task posts whatever arrives as [`ServerEvent::ChannelInput`]
/// and ends with a single [`ServerEvent::ChannelClosed`]; a writer task drains the outbound
/// queue in order.
///
/// Dropping a channel stops the reader right away. The writer finishes sending what was already
/// queued and then shuts the stream down.
pub struct Channel {
    id: ChannelId,
    local_addr: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    _reader: TaskGuard,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl Channel {
    pub fn spawn<S>(id: ChannelId, stream: S, local_addr: Option<SocketAddr>, events: EventSender) -> Self
    where
        S: AsyncRead + AsyncWrite + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let reader_events = events.clone();
        let reader = tokio::task::spawn_local(async move {
            read_loop(id, read_half, reader_events).await;
        });

        tokio::task::spawn_local(async move {
            write_loop(id, write_half, outbound_rx, events).await;
        });

        Self {
            id,
            local_addr,
            outbound,
            _reader: TaskGuard::new(reader),
        }
    }

    pub fn from_tcp(id: ChannelId, stream: TcpStream, events: EventSender) -> Self {
        let local_addr = stream.local_addr().ok();
        Self::spawn(id, stream, local_addr, events)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Queues bytes to be written. Bytes sent to a channel whose writer already stopped are
    /// silently lost, the reader reports the closure.
    pub fn send(&self, data: Vec<u8>) {
        if self.outbound.send(data).is_err() {
            trace!("Channel {} writer is gone, dropping outbound bytes", self.id);
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(id: ChannelId, mut reader: R, events: EventSender) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(ServerEvent::ChannelClosed { channel: id, error: None });
                return;
            }
            Ok(len) => {
                trace!("Channel {id} read {len} bytes");
                let _ = events.send(ServerEvent::ChannelInput {
                    channel: id,
                    data: buf[..len].to_vec(),
                });
            }
            Err(error) => {
                let _ = events.send(ServerEvent::ChannelClosed {
                    channel: id,
                    error: Some(error),
                });
                return;
            }
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(id: ChannelId, mut writer: W, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>, events: EventSender) {
    while let Some(data) = outbound.recv().await {
        if let Err(error) = writer.write_all(&data).await {
            debug!("Channel {id} write failed: {error}");
            let _ = events.send(ServerEvent::ChannelClosed {
                channel: id,
                error: Some(error),
            });
            return;
        }
    }

    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use tokio::{sync::mpsc, task::LocalSet};

    use super::*;

    #[tokio::test]
    async fn test_channel_reads_writes_and_closes() {
        LocalSet::new()
            .run_until(async {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let (ours, mut theirs) = tokio::io::duplex(64);
                let channel = Channel::spawn(ChannelId(5), ours, None, tx);

                channel.send(b"hello".to_vec());
                let mut buf = [0u8; 5];
                theirs.read_exact(&mut buf).await.unwrap();
                assert_eq!(&buf, b"hello");

                theirs.write_all(b"abc").await.unwrap();
                match rx.recv().await {
                    Some(ServerEvent::ChannelInput { channel, data }) => {
                        assert_eq!(channel, ChannelId(5));
                        assert_eq!(data, b"abc");
                    }
                    other => panic!("Unexpected event {other:?}"),
                }

                drop(theirs);
                match rx.recv().await {
                    Some(ServerEvent::ChannelClosed { channel, error }) => {
                        assert_eq!(channel, ChannelId(5));
                        assert!(error.is_none());
                    }
                    other => panic!("Unexpected event {other:?}"),
                }
            })
            .await;
    }

    #[tokio::test]
    async fn test_dropped_channel_flushes_and_shuts_down() {
        LocalSet::new()
            .run_until(async {
                let (tx, _rx) = mpsc::unbounded_channel();
                let (ours, mut theirs) = tokio::io::duplex(64);
                let channel = Channel::spawn(ChannelId(1), ours, None, tx);

                channel.send(vec![1, 2, 3]);
                drop(channel);

                let mut received = Vec::new();
                theirs.read_to_end(&mut received).await.unwrap();
                assert_eq!(received, [1, 2, 3]);
            })
            .await;
    }
}
