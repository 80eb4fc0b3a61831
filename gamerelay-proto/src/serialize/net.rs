use std::{
    io::{self, Error, ErrorKind, Read, Write},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};

use super::{ByteRead, ByteWrite};

impl ByteWrite for Ipv4Addr {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.octets())
    }
}

impl ByteRead for Ipv4Addr {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(<[u8; 4]>::read(reader)?.into())
    }
}

impl ByteWrite for Ipv6Addr {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.octets())
    }
}

impl ByteRead for Ipv6Addr {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(<[u8; 16]>::read(reader)?.into())
    }
}

impl ByteWrite for SocketAddrV4 {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.ip().write(writer)?;
        self.port().write(writer)
    }
}

impl ByteRead for SocketAddrV4 {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let ip = Ipv4Addr::read(reader)?;
        let port = u16::read(reader)?;
        Ok(SocketAddrV4::new(ip, port))
    }
}

impl ByteWrite for SocketAddrV6 {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.ip().write(writer)?;
        self.port().write(writer)?;
        self.flowinfo().write(writer)?;
        self.scope_id().write(writer)
    }
}

impl ByteRead for SocketAddrV6 {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let ip = Ipv6Addr::read(reader)?;
        let port = u16::read(reader)?;
        let flowinfo = u32::read(reader)?;
        let scope_id = u32::read(reader)?;
        Ok(SocketAddrV6::new(ip, port, flowinfo, scope_id))
    }
}

impl ByteWrite for SocketAddr {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            SocketAddr::V4(v4) => {
                4u8.write(writer)?;
                v4.write(writer)
            }
            SocketAddr::V6(v6) => {
                6u8.write(writer)?;
                v6.write(writer)
            }
        }
    }
}

impl ByteRead for SocketAddr {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let addr_type = u8::read(reader)?;
        match addr_type {
            4 => Ok(SocketAddr::V4(SocketAddrV4::read(reader)?)),
            6 => Ok(SocketAddr::V6(SocketAddrV6::read(reader)?)),
            v => Err(Error::new(ErrorKind::InvalidData, format!("Invalid socket address type, {v}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{read_exact_from, write_to_vec};

    #[test]
    fn test_socket_addr_v4_layout() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 9100));
        let bytes = write_to_vec(&addr).unwrap();
        assert_eq!(bytes, [4, 10, 0, 0, 7, 0x8C, 0x23]);
        assert_eq!(read_exact_from::<SocketAddr>(&bytes).unwrap(), addr);
    }

    #[test]
    fn test_unknown_address_type() {
        let error = read_exact_from::<SocketAddr>(&[5, 1, 2, 3, 4, 5, 6]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }
}
