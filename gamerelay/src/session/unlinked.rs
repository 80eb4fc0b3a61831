use std::net::SocketAddr;

use gamerelay_proto::version::GameVersion;

use crate::{
    channel::Channel,
    crypt::{CryptPair, KeyMaterial},
    error::ParseError,
    protocol::{Handshake, Services},
};

use super::Endpoint;

/// A freshly accepted connection that hasn't said who it is yet.
#[derive(Debug)]
pub struct UnlinkedSession {
    port: u16,
    version: GameVersion,
    default_destination: Option<SocketAddr>,
    endpoint: Endpoint,
}

/// The first frame of an unlinked session, parsed.
#[derive(Debug)]
pub struct ReceivedHandshake {
    pub handshake: Handshake,
    pub frame: Vec<u8>,
}

impl UnlinkedSession {
    /// Sends the plaintext server init with fresh keys and switches the channel to them.
    pub fn start(
        channel: Channel,
        port: u16,
        version: GameVersion,
        default_destination: Option<SocketAddr>,
        services: &Services,
    ) -> Result<Self, ParseError> {
        let keys = KeyMaterial::random();
        let init = services.protocol.server_init(version, keys)?;

        let mut endpoint = Endpoint::new(channel);
        endpoint.send(init);
        endpoint.install_crypt(CryptPair::for_local_server(services.ciphers.as_ref(), keys));

        Ok(Self {
            port,
            version,
            default_destination,
            endpoint,
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

    /// Buffers `data` and, once a whole frame is in, parses it as the handshake. Anything after
    /// that frame stays buffered in the endpoint.
    pub fn receive(&mut self, data: Vec<u8>, services: &Services) -> Result<Option<ReceivedHandshake>, ParseError> {
        self.endpoint.receive(data);
        let frame = match self.endpoint.next_frame(services.protocol.as_ref(), self.version)? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let handshake = services.protocol.parse_handshake(self.version, &frame)?;
        Ok(Some(ReceivedHandshake { handshake, frame }))
    }

    pub fn into_endpoint(self) -> Endpoint {
        self.endpoint
    }
}
