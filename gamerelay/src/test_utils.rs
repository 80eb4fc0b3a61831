//! Fake clients and destinations for driving a [`ProxyServer`] over real sockets.

use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use gamerelay_proto::{
    commands::{encode_frame, Login, CLIENT_CONFIG_SIZE, LOGIN},
    frame,
    serialize::ByteRead,
    version::GameVersion,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::{
    crypt::{AesCtrFactory, CryptPair, KeyMaterial},
    protocol::{Protocol, StandardProtocol},
    server::ProxyServer,
};

pub const VERSION: GameVersion = GameVersion::Gc;
pub const SERIAL: u32 = 0x1234_5678;

const DEADLINE: Duration = Duration::from_secs(5);

/// One end of a game connection, speaking through the relay.
pub struct FakePeer {
    stream: TcpStream,
    version: GameVersion,
    crypt: Option<CryptPair>,
    buf: Vec<u8>,
}

impl FakePeer {
    fn new(stream: TcpStream, version: GameVersion) -> Self {
        Self {
            stream,
            version,
            crypt: None,
            buf: Vec::new(),
        }
    }

    async fn fill(&mut self) -> usize {
        let mut chunk = [0u8; 4096];
        let len = self.stream.read(&mut chunk).await.unwrap_or(0);
        let data = &mut chunk[..len];
        if let Some(crypt) = &mut self.crypt {
            crypt.decode.apply(data);
        }

        self.buf.extend_from_slice(data);
        len
    }

    pub async fn read_frame(&mut self) -> Vec<u8> {
        loop {
            if let Some(frame) = frame::split_frame(self.version, &mut self.buf).unwrap() {
                return frame;
            }

            assert_ne!(self.fill().await, 0, "connection closed while waiting for a frame");
        }
    }

    pub async fn read_command<T: ByteRead>(&mut self, command: u16) -> T {
        let frame = self.read_frame().await;
        assert_eq!(frame::FrameHeader::parse(self.version, &frame).unwrap().command, command);
        gamerelay_proto::commands::decode_payload(self.version, &frame).unwrap()
    }

    /// Waits for the relay to close the connection, failing if a frame shows up first.
    pub async fn read_eof(&mut self) {
        while self.fill().await != 0 {}
        assert!(self.buf.is_empty(), "got {} unexpected bytes before the connection closed", self.buf.len());
    }

    pub async fn send_frame(&mut self, mut frame: Vec<u8>) {
        if let Some(crypt) = &mut self.crypt {
            crypt.encode.apply(&mut frame);
        }

        self.stream.write_all(&frame).await.unwrap();
    }

    pub async fn send_command(&mut self, command: u16, payload: &[u8]) {
        self.send_frame(frame::build_frame(self.version, command, 0, payload).unwrap()).await;
    }
}

/// Connects a client to the relay and reads the plaintext server init.
pub async fn connect_client(relay: SocketAddr, version: GameVersion) -> FakePeer {
    let stream = TcpStream::connect(localhost(relay)).await.unwrap();
    let mut peer = FakePeer::new(stream, version);
    let init = peer.read_frame().await;
    let keys = StandardProtocol.parse_server_init(version, &init).unwrap();
    peer.crypt = Some(CryptPair::for_local_client(&AesCtrFactory, keys));
    peer
}

/// A game server the relay connects to.
pub struct FakeDestination {
    listener: TcpListener,
}

impl FakeDestination {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        Self { listener }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Connects to this destination the way an outside caller of `resume_destination` would.
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr()).await.unwrap()
    }

    /// Accepts the relay and opens with a server init under fresh keys.
    pub async fn accept(&self, version: GameVersion) -> FakePeer {
        let (stream, _) = self.listener.accept().await.unwrap();
        let mut peer = FakePeer::new(stream, version);
        let keys = KeyMaterial::random();
        peer.send_frame(StandardProtocol.server_init(version, keys).unwrap()).await;
        peer.crypt = Some(CryptPair::for_local_server(&AesCtrFactory, keys));
        peer
    }
}

pub fn localhost(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
}

pub fn login(serial_number: u32, client_config: [u8; CLIENT_CONFIG_SIZE], destination: Option<SocketAddr>) -> Login {
    Login {
        sub_version: 0x30,
        serial_number,
        access_key: "0123456789ab".to_string(),
        character_name: "Alis".to_string(),
        client_config,
        destination,
    }
}

pub fn login_frame(version: GameVersion, login: &Login) -> Vec<u8> {
    encode_frame(version, LOGIN, 0, login).unwrap()
}

/// Runs `fut` while the server handles events in the background.
pub async fn drive<F: Future>(server: &mut ProxyServer, fut: F) -> F::Output {
    let driven = async {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                output = &mut fut => return output,
                _ = server.process_next_event() => {}
            }
        }
    };

    tokio::time::timeout(DEADLINE, driven).await.expect("timed out driving the relay")
}

/// Handles events until `condition` holds.
pub async fn drive_until<F>(server: &mut ProxyServer, mut condition: F)
where
    F: FnMut(&ProxyServer) -> bool,
{
    let driven = async {
        while !condition(server) {
            server.process_next_event().await;
        }
    };

    tokio::time::timeout(DEADLINE, driven).await.expect("timed out waiting on the relay");
}
