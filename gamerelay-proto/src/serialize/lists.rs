use std::io::{self, Error, ErrorKind, Read, Write};

use super::{ByteRead, ByteWrite};

impl<T: ByteWrite> ByteWrite for [T] {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let len = self.len();
        if len > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidData, "List is too long (>= 64K)"));
        }

        (len as u16).write(writer)?;
        for ele in self.iter() {
            ele.write(writer)?;
        }

        Ok(())
    }
}

impl<T: ByteWrite> ByteWrite for Vec<T> {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_slice().write(writer)
    }
}

impl<T: ByteRead> ByteRead for Vec<T> {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = u16::read(reader)? as usize;

        // Don't trust the length for the allocation, a short frame can't hold that many elements.
        let mut v = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            v.push(T::read(reader)?);
        }

        Ok(v)
    }
}

/// A type that wraps a `&[u8]` and implements [`ByteWrite`] for writing raw byte blobs whose
/// length prefix is an [`u16`].
pub struct WriteBlob<'a>(pub &'a [u8]);

impl<'a> ByteWrite for WriteBlob<'a> {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let len = self.0.len();
        if len > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidData, "Blob is too long (>= 64KB)"));
        }

        (len as u16).write(writer)?;
        writer.write_all(self.0)
    }
}

/// A type that wraps a [`Vec<u8>`] and implements [`ByteRead`] for reading raw byte blobs whose
/// length prefix is an [`u16`].
pub struct ReadBlob(pub Vec<u8>);

impl ByteRead for ReadBlob {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = u16::read(reader)? as usize;
        let mut v = vec![0u8; len];
        reader.read_exact(&mut v)?;
        Ok(ReadBlob(v))
    }
}
