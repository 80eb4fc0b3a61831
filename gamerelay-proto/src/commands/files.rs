use std::io::{self, Read, Write};

use crate::serialize::{ByteRead, ByteWrite, ReadBlob, SmallReadString, SmallWriteString, WriteBlob};

/// Server to client. Announces a file transfer of `size` bytes, delivered in [`FileChunk`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub basename: String,
    pub size: u32,
}

impl ByteWrite for OpenFile {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        SmallWriteString(&self.basename).write(writer)?;
        self.size.write(writer)
    }
}

impl ByteRead for OpenFile {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let basename = SmallReadString::read(reader)?.0;
        let size = u32::read(reader)?;
        Ok(Self { basename, size })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub basename: String,
    pub data: Vec<u8>,
}

impl ByteWrite for FileChunk {
    fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        SmallWriteString(&self.basename).write(writer)?;
        WriteBlob(&self.data).write(writer)
    }
}

impl ByteRead for FileChunk {
    fn read<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let basename = SmallReadString::read(reader)?.0;
        let data = ReadBlob::read(reader)?.0;
        Ok(Self { basename, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::{decode_payload, encode_frame, FILE_CHUNK},
        version::GameVersion,
    };

    #[test]
    fn test_file_chunk_frame() {
        let chunk = FileChunk {
            basename: "quest1.bin".to_string(),
            data: vec![9; 5],
        };

        let frame = encode_frame(GameVersion::Gc, FILE_CHUNK, 0, &chunk).unwrap();
        assert_eq!(frame.len(), 4 + 1 + 10 + 2 + 5);
        assert_eq!(&frame[..4], [0x13, 0, frame.len() as u8, 0]);
        assert_eq!(decode_payload::<FileChunk>(GameVersion::Gc, &frame).unwrap(), chunk);
    }

    #[test]
    fn test_truncated_open_file() {
        let frame = encode_frame(GameVersion::Dc, 0x44, 0, &SmallWriteString("a.dat")).unwrap();
        assert!(decode_payload::<OpenFile>(GameVersion::Dc, &frame).is_err());
    }
}
