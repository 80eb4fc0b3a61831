use std::io::{self, Read, Write};

use crate::serialize::{ByteRead, ByteWrite};

/// Sent in plaintext by whoever plays the server role, right after the connection opens. Both
/// sides derive their cipher streams from these two seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInit {
    pub server_key: u32,
    pub client_key: u32,
}

impl ServerInit {
    pub const fn new(server_key: u32, client_key: u32) -> Self {
        Self { server_key, client_key }
    }
}

impl ByteWrite for ServerInit {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.server_key.write(writer)?;
        self.client_key.write(writer)
    }
}

impl ByteRead for ServerInit {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let server_key = u32::read(reader)?;
        let client_key = u32::read(reader)?;
        Ok(Self::new(server_key, client_key))
    }
}
