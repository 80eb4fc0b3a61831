use std::io::{self, Read, Write};

use crate::serialize::{ByteRead, ByteWrite, SmallReadString, SmallWriteString};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub guild_card_number: u32,
    pub name: String,
}

impl ByteWrite for RosterEntry {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.guild_card_number.write(writer)?;
        SmallWriteString(&self.name).write(writer)
    }
}

impl ByteRead for RosterEntry {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let guild_card_number = u32::read(reader)?;
        let name = SmallReadString::read(reader)?.0;
        Ok(Self { guild_card_number, name })
    }
}

/// Server to client. The full list of players in the lobby the client just joined, and which of
/// them is the client itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LobbyRoster {
    pub client_id: u8,
    pub players: Vec<RosterEntry>,
}

impl ByteWrite for LobbyRoster {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.client_id.write(writer)?;
        self.players.write(writer)
    }
}

impl ByteRead for LobbyRoster {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let client_id = u8::read(reader)?;
        let players = Vec::read(reader)?;
        Ok(Self { client_id, players })
    }
}
