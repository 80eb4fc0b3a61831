//! Frame headers. Every frame starts with a header whose layout depends on the [`GameVersion`],
//! and whose size field counts the whole frame, header included.

use std::fmt;

use crate::version::GameVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub command: u16,
    pub flag: u32,
    pub size: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The size field is smaller than the header itself.
    SizeTooSmall { size: u16, header_size: usize },
    /// A frame being built doesn't fit in the size field.
    TooLarge(usize),
    /// The command or flag doesn't fit in this version's header.
    FieldOutOfRange { command: u16, flag: u32 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeTooSmall { size, header_size } => {
                write!(f, "Frame size {size} is smaller than its {header_size}-byte header")
            }
            Self::TooLarge(len) => write!(f, "Frame of {len} bytes does not fit in a u16 size field"),
            Self::FieldOutOfRange { command, flag } => {
                write!(f, "Command {command:#06x} or flag {flag:#x} does not fit in this header")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl FrameHeader {
    pub const fn new(command: u16, flag: u32, size: u16) -> Self {
        Self { command, flag, size }
    }

    /// Parses a header from the start of `buf`. Returns `None` if `buf` is shorter than a header.
    pub fn parse(version: GameVersion, buf: &[u8]) -> Option<Self> {
        if buf.len() < version.header_size() {
            return None;
        }

        let le16 = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        let header = match version {
            GameVersion::Dc | GameVersion::Gc => Self::new(buf[0] as u16, buf[1] as u32, le16(2)),
            GameVersion::Pc => Self::new(buf[2] as u16, buf[3] as u32, le16(0)),
            GameVersion::Bb => Self::new(le16(2), u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]), le16(0)),
        };

        Some(header)
    }

    pub fn write_to(&self, version: GameVersion, out: &mut Vec<u8>) -> Result<(), FrameError> {
        let size = self.size.to_le_bytes();
        match version {
            GameVersion::Dc | GameVersion::Gc | GameVersion::Pc => {
                if self.command > u8::MAX as u16 || self.flag > u8::MAX as u32 {
                    return Err(FrameError::FieldOutOfRange {
                        command: self.command,
                        flag: self.flag,
                    });
                }

                let (command, flag) = (self.command as u8, self.flag as u8);
                match version {
                    GameVersion::Pc => out.extend_from_slice(&[size[0], size[1], command, flag]),
                    _ => out.extend_from_slice(&[command, flag, size[0], size[1]]),
                }
            }
            GameVersion::Bb => {
                out.extend_from_slice(&size);
                out.extend_from_slice(&self.command.to_le_bytes());
                out.extend_from_slice(&self.flag.to_le_bytes());
            }
        }

        Ok(())
    }
}

/// Removes and returns the first whole frame in `buf`, header included. Returns `Ok(None)` when
/// `buf` doesn't yet hold a whole frame, leaving it untouched.
pub fn split_frame(version: GameVersion, buf: &mut Vec<u8>) -> Result<Option<Vec<u8>>, FrameError> {
    let header = match FrameHeader::parse(version, buf) {
        Some(h) => h,
        None => return Ok(None),
    };

    let header_size = version.header_size();
    let size = header.size as usize;
    if size < header_size {
        return Err(FrameError::SizeTooSmall {
            size: header.size,
            header_size,
        });
    }

    if buf.len() < size {
        return Ok(None);
    }

    let rest = buf.split_off(size);
    Ok(Some(std::mem::replace(buf, rest)))
}

/// Builds a whole frame with a header for `version` followed by `payload`.
pub fn build_frame(version: GameVersion, command: u16, flag: u32, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let total = version.header_size() + payload.len();
    if total > u16::MAX as usize {
        return Err(FrameError::TooLarge(total));
    }

    let mut frame = Vec::with_capacity(total);
    FrameHeader::new(command, flag, total as u16).write_to(version, &mut frame)?;
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Returns the payload of a whole frame, or an empty slice if the frame is just a header.
pub fn frame_payload(version: GameVersion, frame: &[u8]) -> &[u8] {
    frame.get(version.header_size()..).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layouts() {
        let mut dc = Vec::new();
        FrameHeader::new(0x19, 1, 0x0C).write_to(GameVersion::Dc, &mut dc).unwrap();
        assert_eq!(dc, [0x19, 1, 0x0C, 0]);

        let mut pc = Vec::new();
        FrameHeader::new(0x19, 1, 0x0C).write_to(GameVersion::Pc, &mut pc).unwrap();
        assert_eq!(pc, [0x0C, 0, 0x19, 1]);

        let mut bb = Vec::new();
        FrameHeader::new(0x019E, 2, 0x10).write_to(GameVersion::Bb, &mut bb).unwrap();
        assert_eq!(bb, [0x10, 0, 0x9E, 0x01, 2, 0, 0, 0]);
        assert_eq!(FrameHeader::parse(GameVersion::Bb, &bb), Some(FrameHeader::new(0x019E, 2, 0x10)));
    }

    #[test]
    fn test_wide_command_rejected_on_small_headers() {
        let error = build_frame(GameVersion::Gc, 0x0100, 0, &[]).unwrap_err();
        assert_eq!(error, FrameError::FieldOutOfRange { command: 0x0100, flag: 0 });
    }

    #[test]
    fn test_split_waits_for_whole_frame() {
        let frame = build_frame(GameVersion::Gc, 0x60, 0, &[1, 2, 3, 4]).unwrap();
        let mut buf = frame[..5].to_vec();
        assert_eq!(split_frame(GameVersion::Gc, &mut buf), Ok(None));
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&frame[5..]);
        buf.extend_from_slice(&[0x61, 0]);
        assert_eq!(split_frame(GameVersion::Gc, &mut buf), Ok(Some(frame)));
        assert_eq!(buf, [0x61, 0]);
        assert_eq!(split_frame(GameVersion::Gc, &mut buf), Ok(None));
    }

    #[test]
    fn test_split_rejects_undersized_frame() {
        let mut buf = vec![0x02, 0x00, 0x60, 0x00];
        let result = split_frame(GameVersion::Pc, &mut buf);
        assert_eq!(result, Err(FrameError::SizeTooSmall { size: 2, header_size: 4 }));
    }

    #[test]
    fn test_header_only_frame() {
        let mut buf = build_frame(GameVersion::Bb, 0x05, 0, &[]).unwrap();
        let frame = split_frame(GameVersion::Bb, &mut buf).unwrap().unwrap();
        assert!(frame_payload(GameVersion::Bb, &frame).is_empty());
        assert!(buf.is_empty());
    }
}
