//! The seams between the relay core and the game protocol: frame boundaries and the few commands
//! the relay reacts to ([`Protocol`]), frame rewriting by the embedder ([`InspectionHook`]) and
//! destination lookup ([`DestinationResolver`]).

use std::{
    net::{SocketAddr, SocketAddrV4},
    rc::Rc,
};

use gamerelay_link_sm::SessionState;
use gamerelay_proto::{
    commands::{
        decode_payload, encode_frame, FileChunk, LobbyRoster, Login, OpenFile, Redirect, RosterEntry, SecurityData, ServerInit, CLIENT_CONFIG_SIZE,
        FILE_CHUNK, LOBBY_ROSTER, LOGIN, OPEN_FILE, REDIRECT, SECURITY_DATA, SERVER_INIT,
    },
    frame::{self, FrameHeader},
    version::GameVersion,
};

use crate::{
    crypt::{AesCtrFactory, CipherFactory, KeyMaterial},
    error::ParseError,
    session::LobbyPlayer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// What the relay needs out of a client's login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub sub_version: u32,
    pub serial_number: u32,
    pub access_key: String,
    pub character_name: String,
    pub client_config: [u8; CLIENT_CONFIG_SIZE],
    pub destination: Option<SocketAddr>,
}

/// A server to client frame the relay has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Other,
    SecurityData {
        guild_card_number: u32,
        client_config: [u8; CLIENT_CONFIG_SIZE],
    },
    Roster {
        client_id: u8,
        players: Vec<LobbyPlayer>,
    },
    OpenFile {
        basename: String,
        size: u32,
    },
    FileChunk {
        basename: String,
        data: Vec<u8>,
    },
    Redirect(SocketAddrV4),
}

/// Frame grammar and command semantics. All frames passed in and out are whole, decrypted frames
/// with their header.
pub trait Protocol {
    /// Takes the first whole frame out of `buf`, or returns `Ok(None)` if there isn't one yet.
    fn split_frame(&self, version: GameVersion, buf: &mut Vec<u8>) -> Result<Option<Vec<u8>>, ParseError>;

    fn server_init(&self, version: GameVersion, keys: KeyMaterial) -> Result<Vec<u8>, ParseError>;

    fn parse_server_init(&self, version: GameVersion, frame: &[u8]) -> Result<KeyMaterial, ParseError>;

    fn parse_handshake(&self, version: GameVersion, frame: &[u8]) -> Result<Handshake, ParseError>;

    fn observe(&self, version: GameVersion, direction: Direction, frame: &[u8]) -> Result<FrameEvent, ParseError>;

    fn security_data(&self, version: GameVersion, guild_card_number: u32, config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError>;

    fn rewrite_security_data(&self, version: GameVersion, frame: &[u8], config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError>;

    /// Builds a roster frame, used to put a resumed client back in the lobby it left.
    fn lobby_roster(&self, version: GameVersion, client_id: u8, players: &[LobbyPlayer]) -> Result<Vec<u8>, ParseError>;

    fn rewrite_redirect(&self, version: GameVersion, frame: &[u8], address: SocketAddrV4) -> Result<Vec<u8>, ParseError>;

    fn rewrite_handshake_config(&self, version: GameVersion, frame: &[u8], config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError>;
}

/// The session a frame passing through an [`InspectionHook`] belongs to.
#[derive(Debug, Clone, Copy)]
pub struct HookContext {
    pub session_id: u64,
    pub version: GameVersion,
    pub state: SessionState,
}

pub trait InspectionHook {
    /// Returns the bytes to forward in place of `frame`. An empty vector suppresses the frame.
    fn inspect(&self, context: &HookContext, direction: Direction, frame: Vec<u8>) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl InspectionHook for PassThrough {
    fn inspect(&self, _context: &HookContext, _direction: Direction, frame: Vec<u8>) -> Vec<u8> {
        frame
    }
}

pub trait DestinationResolver {
    fn resolve(&self, handshake: &Handshake) -> Option<SocketAddr>;
}

/// Goes wherever the client's login asks to go.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandshakeDestination;

impl DestinationResolver for HandshakeDestination {
    fn resolve(&self, handshake: &Handshake) -> Option<SocketAddr> {
        handshake.destination
    }
}

/// The collaborators a server runs with.
#[derive(Clone)]
pub struct Services {
    pub protocol: Rc<dyn Protocol>,
    pub ciphers: Rc<dyn CipherFactory>,
    pub hook: Rc<dyn InspectionHook>,
    pub resolver: Rc<dyn DestinationResolver>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            protocol: Rc::new(StandardProtocol),
            ciphers: Rc::new(AesCtrFactory),
            hook: Rc::new(PassThrough),
            resolver: Rc::new(HandshakeDestination),
        }
    }
}

impl Services {
    pub fn with_hook(mut self, hook: Rc<dyn InspectionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn DestinationResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

/// [`Protocol`] over the frame headers and commands of `gamerelay-proto`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProtocol;

fn header_of(version: GameVersion, frame: &[u8]) -> Result<FrameHeader, ParseError> {
    FrameHeader::parse(version, frame).ok_or(ParseError::Frame(frame::FrameError::SizeTooSmall {
        size: frame.len() as u16,
        header_size: version.header_size(),
    }))
}

fn expect_command(version: GameVersion, frame: &[u8], expected: u16) -> Result<FrameHeader, ParseError> {
    let header = header_of(version, frame)?;
    match header.command == expected {
        true => Ok(header),
        false => Err(ParseError::UnexpectedCommand {
            expected,
            actual: header.command,
        }),
    }
}

fn decode<T: gamerelay_proto::serialize::ByteRead>(version: GameVersion, frame: &[u8], command: u16) -> Result<T, ParseError> {
    decode_payload(version, frame).map_err(|source| ParseError::Command { command, source })
}

fn encode<T: gamerelay_proto::serialize::ByteWrite>(version: GameVersion, command: u16, flag: u32, value: &T) -> Result<Vec<u8>, ParseError> {
    encode_frame(version, command, flag, value).map_err(|source| ParseError::Command { command, source })
}

impl Protocol for StandardProtocol {
    fn split_frame(&self, version: GameVersion, buf: &mut Vec<u8>) -> Result<Option<Vec<u8>>, ParseError> {
        Ok(frame::split_frame(version, buf)?)
    }

    fn server_init(&self, version: GameVersion, keys: KeyMaterial) -> Result<Vec<u8>, ParseError> {
        encode(version, SERVER_INIT, 0, &ServerInit::new(keys.server_key, keys.client_key))
    }

    fn parse_server_init(&self, version: GameVersion, frame: &[u8]) -> Result<KeyMaterial, ParseError> {
        expect_command(version, frame, SERVER_INIT)?;
        let init: ServerInit = decode(version, frame, SERVER_INIT)?;
        Ok(KeyMaterial::new(init.server_key, init.client_key))
    }

    fn parse_handshake(&self, version: GameVersion, frame: &[u8]) -> Result<Handshake, ParseError> {
        expect_command(version, frame, LOGIN)?;
        let login: Login = decode(version, frame, LOGIN)?;
        Ok(Handshake {
            sub_version: login.sub_version,
            serial_number: login.serial_number,
            access_key: login.access_key,
            character_name: login.character_name,
            client_config: login.client_config,
            destination: login.destination,
        })
    }

    fn observe(&self, version: GameVersion, direction: Direction, frame: &[u8]) -> Result<FrameEvent, ParseError> {
        if direction == Direction::ClientToServer {
            return Ok(FrameEvent::Other);
        }

        let command = header_of(version, frame)?.command;
        let event = match command {
            SECURITY_DATA => {
                let data: SecurityData = decode(version, frame, command)?;
                FrameEvent::SecurityData {
                    guild_card_number: data.guild_card_number,
                    client_config: data.client_config,
                }
            }
            LOBBY_ROSTER => {
                let roster: LobbyRoster = decode(version, frame, command)?;
                let players = roster.players.into_iter().map(|p| LobbyPlayer::new(p.guild_card_number, p.name));
                FrameEvent::Roster {
                    client_id: roster.client_id,
                    players: players.collect(),
                }
            }
            OPEN_FILE => {
                let open: OpenFile = decode(version, frame, command)?;
                FrameEvent::OpenFile {
                    basename: open.basename,
                    size: open.size,
                }
            }
            FILE_CHUNK => {
                let chunk: FileChunk = decode(version, frame, command)?;
                FrameEvent::FileChunk {
                    basename: chunk.basename,
                    data: chunk.data,
                }
            }
            REDIRECT => FrameEvent::Redirect(decode::<Redirect>(version, frame, command)?.address),
            _ => FrameEvent::Other,
        };

        Ok(event)
    }

    fn security_data(&self, version: GameVersion, guild_card_number: u32, config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError> {
        let data = SecurityData {
            guild_card_number,
            client_config: *config,
        };

        encode(version, SECURITY_DATA, 0, &data)
    }

    fn rewrite_security_data(&self, version: GameVersion, frame: &[u8], config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError> {
        let header = expect_command(version, frame, SECURITY_DATA)?;
        let mut data: SecurityData = decode(version, frame, SECURITY_DATA)?;
        data.client_config = *config;
        encode(version, SECURITY_DATA, header.flag, &data)
    }

    fn lobby_roster(&self, version: GameVersion, client_id: u8, players: &[LobbyPlayer]) -> Result<Vec<u8>, ParseError> {
        let players = players.iter().map(|p| RosterEntry {
            guild_card_number: p.guild_card_number,
            name: p.name.clone(),
        });

        let roster = LobbyRoster {
            client_id,
            players: players.collect(),
        };

        encode(version, LOBBY_ROSTER, 0, &roster)
    }

    fn rewrite_redirect(&self, version: GameVersion, frame: &[u8], address: SocketAddrV4) -> Result<Vec<u8>, ParseError> {
        let header = expect_command(version, frame, REDIRECT)?;
        encode(version, REDIRECT, header.flag, &Redirect { address })
    }

    fn rewrite_handshake_config(&self, version: GameVersion, frame: &[u8], config: &[u8; CLIENT_CONFIG_SIZE]) -> Result<Vec<u8>, ParseError> {
        let header = expect_command(version, frame, LOGIN)?;
        let mut login: Login = decode(version, frame, LOGIN)?;
        login.client_config = *config;
        encode(version, LOGIN, header.flag, &login)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_observe_roster_and_redirect() {
        let roster = LobbyRoster {
            client_id: 1,
            players: vec![
                RosterEntry {
                    guild_card_number: 1,
                    name: "Alis".to_string(),
                },
                RosterEntry {
                    guild_card_number: 2,
                    name: "Noah".to_string(),
                },
            ],
        };

        let frame = encode_frame(GameVersion::Gc, LOBBY_ROSTER, 0, &roster).unwrap();
        let event = StandardProtocol.observe(GameVersion::Gc, Direction::ServerToClient, &frame).unwrap();
        assert_eq!(
            event,
            FrameEvent::Roster {
                client_id: 1,
                players: vec![LobbyPlayer::new(1, "Alis".to_string()), LobbyPlayer::new(2, "Noah".to_string())],
            }
        );

        let client_side = StandardProtocol.observe(GameVersion::Gc, Direction::ClientToServer, &frame).unwrap();
        assert_eq!(client_side, FrameEvent::Other);

        let address = SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 9), 9200);
        let redirect = encode_frame(GameVersion::Pc, REDIRECT, 3, &Redirect { address }).unwrap();
        let event = StandardProtocol.observe(GameVersion::Pc, Direction::ServerToClient, &redirect).unwrap();
        assert_eq!(event, FrameEvent::Redirect(address));
    }

    #[test]
    fn test_rebuilt_roster_observes_the_same() {
        let players = [LobbyPlayer::new(42, "Alis".to_string()), LobbyPlayer::new(7, "Myau".to_string())];
        let frame = StandardProtocol.lobby_roster(GameVersion::Bb, 1, &players).unwrap();

        let event = StandardProtocol.observe(GameVersion::Bb, Direction::ServerToClient, &frame).unwrap();
        assert_eq!(
            event,
            FrameEvent::Roster {
                client_id: 1,
                players: players.to_vec(),
            }
        );
    }

    #[test]
    fn test_rewrite_redirect_keeps_flag() {
        let from = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 9300);
        let to = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9100);
        let frame = encode_frame(GameVersion::Dc, REDIRECT, 7, &Redirect { address: from }).unwrap();

        let rewritten = StandardProtocol.rewrite_redirect(GameVersion::Dc, &frame, to).unwrap();
        assert_eq!(FrameHeader::parse(GameVersion::Dc, &rewritten).map(|h| h.flag), Some(7));
        assert_eq!(decode_payload::<Redirect>(GameVersion::Dc, &rewritten).unwrap().address, to);
    }

    #[test]
    fn test_handshake_must_be_a_login() {
        let frame = StandardProtocol.server_init(GameVersion::Bb, KeyMaterial::new(1, 2)).unwrap();
        let error = StandardProtocol.parse_handshake(GameVersion::Bb, &frame).unwrap_err();
        assert!(matches!(error, ParseError::UnexpectedCommand { expected: LOGIN, actual: SERVER_INIT }));
        assert_eq!(StandardProtocol.parse_server_init(GameVersion::Bb, &frame).unwrap(), KeyMaterial::new(1, 2));
    }

    #[test]
    fn test_unknown_commands_are_other() {
        let frame = frame::build_frame(GameVersion::Gc, 0x60, 0, &[0xFF; 12]).unwrap();
        let event = StandardProtocol.observe(GameVersion::Gc, Direction::ServerToClient, &frame).unwrap();
        assert_eq!(event, FrameEvent::Other);
    }

    #[test]
    fn test_malformed_known_command() {
        let frame = frame::build_frame(GameVersion::Gc, OPEN_FILE, 0, &[3, b'a']).unwrap();
        let error = StandardProtocol.observe(GameVersion::Gc, Direction::ServerToClient, &frame).unwrap_err();
        assert!(matches!(error, ParseError::Command { command: OPEN_FILE, .. }));
    }
}
