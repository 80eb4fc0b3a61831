//! The commands the relay needs to understand. Each type here is the payload of one frame; the
//! header is handled by [`crate::frame`].

use std::io::{self, Error, ErrorKind};

use crate::{
    frame::{build_frame, frame_payload},
    serialize::{read_exact_from, write_to_vec, ByteRead, ByteWrite},
    version::GameVersion,
};

mod files;
mod lobby;
mod login;
mod redirect;
mod security;
mod server_init;

pub use files::*;
pub use lobby::*;
pub use login::*;
pub use redirect::*;
pub use security::*;
pub use server_init::*;

pub const SERVER_INIT: u16 = 0x02;
pub const SECURITY_DATA: u16 = 0x04;
pub const FILE_CHUNK: u16 = 0x13;
pub const REDIRECT: u16 = 0x19;
pub const OPEN_FILE: u16 = 0x44;
pub const LOBBY_ROSTER: u16 = 0x67;
pub const LOGIN: u16 = 0x9E;

/// Size of the opaque client config blob the server hands to the client.
pub const CLIENT_CONFIG_SIZE: usize = 0x20;

/// Parses the payload of a whole frame as a `T`. The payload must be consumed exactly.
pub fn decode_payload<T: ByteRead>(version: GameVersion, frame: &[u8]) -> io::Result<T> {
    read_exact_from(frame_payload(version, frame))
}

/// Serializes `value` and wraps it in a frame for `version`.
pub fn encode_frame<T: ByteWrite + ?Sized>(version: GameVersion, command: u16, flag: u32, value: &T) -> io::Result<Vec<u8>> {
    let payload = write_to_vec(value)?;
    build_frame(version, command, flag, &payload).map_err(|error| Error::new(ErrorKind::InvalidData, error))
}
