//! Defines the [`ByteRead`] and [`ByteWrite`] traits and implements them for the basic types
//! command payloads are built from.
//!
//! This includes [`bool`], [`u8`], [`u16`], [`u32`], [`u64`], [`i16`], fixed-size byte arrays,
//! [`String`], [`Vec<T>`], [`Ipv4Addr`](std::net::Ipv4Addr),
//! [`SocketAddrV4`](std::net::SocketAddrV4), [`SocketAddrV6`](std::net::SocketAddrV6),
//! [`SocketAddr`](std::net::SocketAddr) and [`Option<T>`].
//!
//! All integers are little-endian, as that is what every supported game version puts on the
//! wire.
//!
//! # Serialization of [`Option<T>`]
//! A presence byte, 1 if Some and 0 if None, and if 1 then this byte is followed by the
//! serialization of `T`.
//!
//! # Serialization of strings and lists
//! [`String`] is serialized as a chunked string, starting with an [`u16`] indicating the length of
//! the string in bytes, followed by said amount of bytes. Names and file basenames are never
//! longer than 255 bytes, so these are serialized with [`u8`] length instead through the
//! [`SmallReadString`] and [`SmallWriteString`] types.
//!
//! [`Vec<T>`] is serialized as a chunked list, starting with an [`u16`] indicating the length,
//! followed by said amount of elements.
//!
//! Payloads are always parsed out of an in-memory frame, so the traits work over
//! [`std::io::Read`] and [`std::io::Write`] and never block.

use std::io::{self, Error, ErrorKind, Read, Write};

pub mod enums;
pub mod lists;
pub mod net;
pub mod primitives;
pub mod string;

pub use lists::*;
pub use string::*;

/// Serializes a type into bytes, writing it to a [`Write`].
pub trait ByteWrite {
    /// Serializes this instance into bytes, writing those bytes into a writer.
    ///
    /// When an error occurs, there's no guarantee on how many bytes were written.
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()>;
}

/// Deserializes a type from raw bytes, reading it from a [`Read`].
pub trait ByteRead: Sized {
    /// Deserializes bytes into an instance of this type by reading bytes from a reader.
    ///
    /// When an error occurs, there's no guarantee on how many bytes were read.
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self>;
}

/// Parses a value that must span the whole of `buf`. Trailing bytes are an error.
pub fn read_exact_from<T: ByteRead>(mut buf: &[u8]) -> io::Result<T> {
    let value = T::read(&mut buf)?;
    match buf.is_empty() {
        true => Ok(value),
        false => Err(Error::new(
            ErrorKind::InvalidData,
            format!("{} trailing bytes after payload", buf.len()),
        )),
    }
}

/// Serializes a value into a new [`Vec<u8>`].
pub fn write_to_vec<T: ByteWrite + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.write(&mut buf)?;
    Ok(buf)
}
