use std::io::{self, Error, ErrorKind, Read, Write};

use super::{ByteRead, ByteWrite};

fn read_utf8<R: Read + ?Sized>(reader: &mut R, len: usize, what: &str) -> io::Result<String> {
    let mut v = vec![0u8; len];
    reader.read_exact(&mut v)?;
    String::from_utf8(v).map_err(|_| Error::new(ErrorKind::InvalidData, format!("{what} is not valid UTF-8")))
}

impl ByteWrite for str {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.as_bytes();
        let len = bytes.len();
        if len > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidData, "String is too long (>= 64KB)"));
        }

        (len as u16).write(writer)?;
        writer.write_all(bytes)
    }
}

impl ByteWrite for String {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_str().write(writer)
    }
}

impl ByteRead for String {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = u16::read(reader)? as usize;
        read_utf8(reader, len, "String")
    }
}

/// A type that wraps a `&str` and implements [`ByteWrite`] for easily writing strings whose max
/// length is 255 bytes.
pub struct SmallWriteString<'a>(pub &'a str);

impl<'a> ByteWrite for SmallWriteString<'a> {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.0.as_bytes();
        let len = bytes.len();
        if len > u8::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidData, "Small string is too long (>= 256B)"));
        }

        (len as u8).write(writer)?;
        writer.write_all(bytes)
    }
}

/// A type that wraps a [`String`] and implements [`ByteRead`] for easily reading strings whose max
/// length is 255 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallReadString(pub String);

impl ByteRead for SmallReadString {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = u8::read(reader)? as usize;
        read_utf8(reader, len, "Small string").map(SmallReadString)
    }
}
