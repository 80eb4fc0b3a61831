use std::{fmt, str::FromStr};

/// The game versions a listener can be tagged with. The version decides the frame header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameVersion {
    /// Dreamcast: `command:u8 flag:u8 size:u16`.
    Dc,
    /// PC: `size:u16 command:u8 flag:u8`.
    Pc,
    /// GameCube, same header as Dreamcast.
    Gc,
    /// Blue Burst: `size:u16 command:u16 flag:u32`.
    Bb,
}

impl GameVersion {
    pub const fn header_size(self) -> usize {
        match self {
            Self::Dc | Self::Pc | Self::Gc => 4,
            Self::Bb => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Dc => "DC",
            Self::Pc => "PC",
            Self::Gc => "GC",
            Self::Bb => "BB",
        }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGameVersion(pub String);

impl fmt::Display for UnknownGameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown game version {}, expected one of dc, pc, gc or bb", self.0)
    }
}

impl std::error::Error for UnknownGameVersion {}

impl FromStr for GameVersion {
    type Err = UnknownGameVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("dc") {
            Ok(Self::Dc)
        } else if s.eq_ignore_ascii_case("pc") {
            Ok(Self::Pc)
        } else if s.eq_ignore_ascii_case("gc") {
            Ok(Self::Gc)
        } else if s.eq_ignore_ascii_case("bb") {
            Ok(Self::Bb)
        } else {
            Err(UnknownGameVersion(s.to_string()))
        }
    }
}
