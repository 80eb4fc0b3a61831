use std::{
    io::{self, Read, Write},
    net::SocketAddr,
};

use crate::serialize::{ByteRead, ByteWrite, SmallReadString, SmallWriteString};

use super::CLIENT_CONFIG_SIZE;

/// Client to server, the first frame on every connection once keys are set up. `client_config` is
/// whatever the last [`SecurityData`](super::SecurityData) assigned, zeroed on a fresh start.
///
/// `destination` is only meaningful to a relay: a client that knows it is talking through one
/// may name where it wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub sub_version: u32,
    pub serial_number: u32,
    pub access_key: String,
    pub character_name: String,
    pub client_config: [u8; CLIENT_CONFIG_SIZE],
    pub destination: Option<SocketAddr>,
}

impl ByteWrite for Login {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.sub_version.write(writer)?;
        self.serial_number.write(writer)?;
        SmallWriteString(&self.access_key).write(writer)?;
        SmallWriteString(&self.character_name).write(writer)?;
        self.client_config.write(writer)?;
        self.destination.write(writer)
    }
}

impl ByteRead for Login {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let sub_version = u32::read(reader)?;
        let serial_number = u32::read(reader)?;
        let access_key = SmallReadString::read(reader)?.0;
        let character_name = SmallReadString::read(reader)?.0;
        let client_config = <[u8; CLIENT_CONFIG_SIZE]>::read(reader)?;
        let destination = Option::read(reader)?;

        Ok(Self {
            sub_version,
            serial_number,
            access_key,
            character_name,
            client_config,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use super::*;
    use crate::{
        commands::{decode_payload, encode_frame, LOGIN},
        version::GameVersion,
    };

    #[test]
    fn test_login_frame() {
        let login = Login {
            sub_version: 0x30,
            serial_number: 0x1234_5678,
            access_key: "abcdefgh".to_string(),
            character_name: "Zoke".to_string(),
            client_config: [0; CLIENT_CONFIG_SIZE],
            destination: Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000))),
        };

        let frame = encode_frame(GameVersion::Bb, LOGIN, 0, &login).unwrap();
        assert_eq!(&frame[2..4], [0x9E, 0]);
        assert_eq!(decode_payload::<Login>(GameVersion::Bb, &frame).unwrap(), login);
    }

    #[test]
    fn test_login_with_trailing_garbage() {
        let login = Login {
            sub_version: 1,
            serial_number: 2,
            access_key: String::new(),
            character_name: String::new(),
            client_config: [7; CLIENT_CONFIG_SIZE],
            destination: None,
        };

        let mut frame = encode_frame(GameVersion::Dc, LOGIN, 0, &login).unwrap();
        frame.push(0xFF);
        frame[2] += 1;
        assert!(decode_payload::<Login>(GameVersion::Dc, &frame).is_err());
    }
}
