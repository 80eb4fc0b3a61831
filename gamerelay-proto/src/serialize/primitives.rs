use std::io::{self, Read, Write};

use super::{ByteRead, ByteWrite};

impl ByteWrite for bool {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        (*self as u8).write(writer)
    }
}

impl ByteRead for bool {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(u8::read(reader)? != 0)
    }
}

macro_rules! impl_le_integer {
    ($($t:ty),*) => {
        $(
            impl ByteWrite for $t {
                fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
                    writer.write_all(&self.to_le_bytes())
                }
            }

            impl ByteRead for $t {
                fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    reader.read_exact(&mut buf)?;
                    Ok(<$t>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_le_integer!(u8, u16, u32, u64, i16);

impl<const N: usize> ByteWrite for [u8; N] {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self)
    }
}

impl<const N: usize> ByteRead for [u8; N] {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<T: ByteWrite> ByteWrite for &T {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        (*self).write(writer)
    }
}

#[cfg(test)]
mod tests {
    use crate::serialize::{read_exact_from, write_to_vec};

    #[test]
    fn test_integers_are_little_endian() {
        assert_eq!(write_to_vec(&0x1234u16).unwrap(), [0x34, 0x12]);
        assert_eq!(write_to_vec(&0x01020304u32).unwrap(), [4, 3, 2, 1]);
        assert_eq!(write_to_vec(&-2i16).unwrap(), [0xFE, 0xFF]);
        assert_eq!(read_exact_from::<u64>(&[1, 0, 0, 0, 0, 0, 0, 0x80]).unwrap(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_short_input_is_an_error() {
        assert!(read_exact_from::<u32>(&[1, 2, 3]).is_err());
        assert!(read_exact_from::<[u8; 4]>(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_trailing_bytes_are_an_error() {
        assert!(read_exact_from::<u16>(&[1, 2, 3]).is_err());
        assert_eq!(read_exact_from::<bool>(&[7]).unwrap(), true);
    }
}
