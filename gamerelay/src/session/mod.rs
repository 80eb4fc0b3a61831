use gamerelay_proto::{commands::CLIENT_CONFIG_SIZE, version::GameVersion};

use crate::{
    channel::Channel,
    crypt::CryptPair,
    error::ParseError,
    protocol::Protocol,
};

mod capture;
mod linked;
pub mod token;
mod unlinked;

pub use capture::*;
pub use linked::*;
pub use unlinked::*;

/// Credentials a session was created with. Shared read-only with whoever created the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub serial_number: u32,
    pub access_key: String,
}

impl License {
    pub fn new(serial_number: u32, access_key: String) -> Self {
        Self {
            serial_number,
            access_key,
        }
    }
}

/// The config blob the destination last assigned to the client, plus local overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub data: [u8; CLIENT_CONFIG_SIZE],
    pub override_section_id: Option<i16>,
    pub override_lobby_event: Option<i16>,
    pub override_lobby_number: Option<i16>,
}

impl ClientConfig {
    pub const fn new(data: [u8; CLIENT_CONFIG_SIZE]) -> Self {
        Self {
            data,
            override_section_id: None,
            override_lobby_event: None,
            override_lobby_number: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new([0; CLIENT_CONFIG_SIZE])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub guild_card_number: u32,
    pub name: String,
}

impl LobbyPlayer {
    pub const fn new(guild_card_number: u32, name: String) -> Self {
        Self { guild_card_number, name }
    }
}

/// A channel together with its cipher pair and the decoded bytes that don't make a whole frame
/// yet.
///
/// Until a pair is installed, bytes are buffered as they arrive. Installing a pair decodes
/// whatever is still buffered, so the frames right after a server init aren't lost.
#[derive(Debug)]
pub struct Endpoint {
    pub channel: Channel,
    crypt: Option<CryptPair>,
    buffer: Vec<u8>,
}

impl Endpoint {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            crypt: None,
            buffer: Vec::new(),
        }
    }

    pub fn has_crypt(&self) -> bool {
        self.crypt.is_some()
    }

    pub fn install_crypt(&mut self, mut crypt: CryptPair) {
        crypt.decode.apply(&mut self.buffer);
        self.crypt = Some(crypt);
    }

    pub fn receive(&mut self, mut data: Vec<u8>) {
        if let Some(crypt) = &mut self.crypt {
            crypt.decode.apply(&mut data);
        }

        match self.buffer.is_empty() {
            true => self.buffer = data,
            false => self.buffer.extend_from_slice(&data),
        }
    }

    pub fn next_frame(&mut self, protocol: &dyn Protocol, version: GameVersion) -> Result<Option<Vec<u8>>, ParseError> {
        protocol.split_frame(version, &mut self.buffer)
    }

    /// Encodes (if a pair is installed) and queues a frame for writing.
    pub fn send(&mut self, mut frame: Vec<u8>) {
        if let Some(crypt) = &mut self.crypt {
            crypt.encode.apply(&mut frame);
        }

        self.channel.send(frame);
    }
}
