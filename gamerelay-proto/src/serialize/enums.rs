use std::io::{self, Read, Write};

use super::{ByteRead, ByteWrite};

impl<T: ByteWrite> ByteWrite for Option<T> {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Some(value) => {
                1u8.write(writer)?;
                value.write(writer)
            }
            None => 0u8.write(writer),
        }
    }
}

impl<T: ByteRead> ByteRead for Option<T> {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let has_value = u8::read(reader)?;
        match has_value {
            0 => Ok(None),
            _ => Ok(Some(T::read(reader)?)),
        }
    }
}
