use std::io::{self, Read, Write};

use crate::serialize::{ByteRead, ByteWrite};

use super::CLIENT_CONFIG_SIZE;

/// Server to client. Assigns the guild card number and the config blob the client must echo back
/// on its next login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityData {
    pub guild_card_number: u32,
    pub client_config: [u8; CLIENT_CONFIG_SIZE],
}

impl ByteWrite for SecurityData {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.guild_card_number.write(writer)?;
        self.client_config.write(writer)
    }
}

impl ByteRead for SecurityData {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let guild_card_number = u32::read(reader)?;
        let client_config = <[u8; CLIENT_CONFIG_SIZE]>::read(reader)?;
        Ok(Self {
            guild_card_number,
            client_config,
        })
    }
}
