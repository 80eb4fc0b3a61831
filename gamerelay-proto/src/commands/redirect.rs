use std::{
    io::{self, Read, Write},
    net::SocketAddrV4,
};

use crate::serialize::{ByteRead, ByteWrite};

/// Server to client. Tells the client to drop this connection and connect to `address` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub address: SocketAddrV4,
}

impl ByteWrite for Redirect {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.address.write(writer)
    }
}

impl ByteRead for Redirect {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            address: SocketAddrV4::read(reader)?,
        })
    }
}
