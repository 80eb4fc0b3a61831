use std::{
    collections::VecDeque,
    io::{self, ErrorKind},
    mem,
    net::SocketAddr,
    rc::Rc,
};

use gamerelay_link_sm::{SessionEvent, SessionMachine, SessionState, Side, TimerChange, TimerToken, Transition};
use gamerelay_proto::{commands::CLIENT_CONFIG_SIZE, version::GameVersion};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{
    channel::{Channel, ChannelId},
    config::ProxyConfig,
    crypt::CryptPair,
    error::RelayError,
    protocol::{Direction, FrameEvent, HookContext, Services},
    server::{EventSender, ServerEvent},
    timer::{TaskGuard, TimeoutGuard},
};

use super::{capture_path, token, CaptureFile, CaptureProgress, ClientConfig, Endpoint, FileCaptures, License, LobbyPlayer, ReceivedHandshake};

/// What a session operation needs from the server that owns it.
pub struct SessionContext {
    pub services: Services,
    pub config: ProxyConfig,
    pub events: EventSender,
}

/// One logical proxy session. Owns at most one channel per side and outlives any of them.
pub struct LinkedSession {
    id: u64,
    port: u16,
    version: GameVersion,
    license: Option<Rc<License>>,
    config: ClientConfig,
    machine: SessionMachine,
    timer: Option<TimeoutGuard>,
    connect_task: Option<TaskGuard>,
    client: Option<Endpoint>,
    server: Option<Endpoint>,
    pending_to_server: VecDeque<Vec<u8>>,
    roster: Vec<LobbyPlayer>,
    lobby_client_id: Option<u8>,
    captures: FileCaptures<CaptureFile>,
    next_destination: Option<SocketAddr>,
    sub_version: u32,
    character_name: String,
    guild_card_number: Option<u32>,
    released: Vec<ChannelId>,
}

impl LinkedSession {
    /// Creates a session in `ClientOnly`, with its timeout already running.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        port: u16,
        version: GameVersion,
        license: Option<Rc<License>>,
        config: ClientConfig,
        client: Option<Endpoint>,
        next_destination: Option<SocketAddr>,
        ctx: &SessionContext,
    ) -> Self {
        let machine = SessionMachine::new(client.is_some());
        let timer = machine
            .armed_timer()
            .map(|token| TimeoutGuard::arm(ctx.events.clone(), id, token, ctx.config.session_timeout));

        Self {
            id,
            port,
            version,
            guild_card_number: license.as_ref().map(|l| l.serial_number),
            license,
            config,
            machine,
            timer,
            connect_task: None,
            client,
            server: None,
            pending_to_server: VecDeque::new(),
            roster: Vec::new(),
            lobby_client_id: None,
            captures: FileCaptures::new(),
            next_destination,
            sub_version: 0,
            character_name: String::new(),
            released: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn version(&self) -> GameVersion {
        self.version
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn license(&self) -> Option<&Rc<License>> {
        self.license.as_ref()
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client_config_mut(&mut self) -> &mut ClientConfig {
        &mut self.config
    }

    pub fn roster(&self) -> &[LobbyPlayer] {
        &self.roster
    }

    /// The client's own slot in the last roster the destination sent.
    pub fn lobby_client_id(&self) -> Option<u8> {
        self.lobby_client_id
    }

    pub fn next_destination(&self) -> Option<SocketAddr> {
        self.next_destination
    }

    pub fn sub_version(&self) -> u32 {
        self.sub_version
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn guild_card_number(&self) -> Option<u32> {
        self.guild_card_number
    }

    pub fn armed_timer(&self) -> Option<TimerToken> {
        self.timer.as_ref().map(|t| t.token())
    }

    pub fn captures_in_progress(&self) -> usize {
        self.captures.len()
    }

    pub fn channel_id(&self, side: Side) -> Option<ChannelId> {
        self.endpoint(side).map(|e| e.channel.id())
    }

    /// The config blob a client must log in with to resume this session.
    pub fn resume_token_config(&self) -> [u8; CLIENT_CONFIG_SIZE] {
        token::with_token(&self.config.data, self.id)
    }

    /// Channels this session let go of since the last call.
    pub fn take_released_channels(&mut self) -> Vec<ChannelId> {
        mem::take(&mut self.released)
    }

    fn endpoint(&self, side: Side) -> Option<&Endpoint> {
        match side {
            Side::Client => self.client.as_ref(),
            Side::Server => self.server.as_ref(),
        }
    }

    fn endpoint_mut(&mut self, side: Side) -> Option<&mut Endpoint> {
        match side {
            Side::Client => self.client.as_mut(),
            Side::Server => self.server.as_mut(),
        }
    }

    fn release(&mut self, side: Side) {
        let endpoint = match side {
            Side::Client => self.client.take(),
            Side::Server => self.server.take(),
        };

        if let Some(endpoint) = endpoint {
            debug!("Session {:#x} disconnecting {side} channel {}", self.id, endpoint.channel.id());
            self.released.push(endpoint.channel.id());
        }
    }

    /// Feeds an event to the state machine and carries out what the transition asks for.
    fn apply(&mut self, event: SessionEvent, ctx: &SessionContext) -> Result<Transition, RelayError> {
        let transition = self.machine.handle(event)?;

        match transition.timer {
            TimerChange::Keep => {}
            TimerChange::Arm(token) => {
                self.timer = Some(TimeoutGuard::arm(ctx.events.clone(), self.id, token, ctx.config.session_timeout));
            }
            TimerChange::Cancel => self.timer = None,
        }

        if transition.changed_state() {
            info!("Session {:#x} went from {} to {}", self.id, transition.from, transition.to);
        }

        if transition.start_connect {
            self.start_connect(ctx);
        }

        if let Some(reason) = transition.close_reason {
            info!("Session {:#x} closed: {reason}", self.id);
            self.teardown();
        }

        Ok(transition)
    }

    fn start_connect(&mut self, ctx: &SessionContext) {
        let session_id = self.id;
        let destination = self.next_destination;
        let events = ctx.events.clone();
        info!("Session {session_id:#x} connecting to {destination:?}");

        let handle = tokio::task::spawn_local(async move {
            let result = match destination {
                Some(address) => TcpStream::connect(address).await,
                None => Err(io::Error::new(ErrorKind::NotFound, "session has no destination")),
            };

            let _ = events.send(ServerEvent::ConnectCompleted {
                session_id,
                destination,
                result,
            });
        });

        self.connect_task = Some(TaskGuard::new(handle));
    }

    fn teardown(&mut self) {
        self.release(Side::Client);
        self.release(Side::Server);
        self.pending_to_server.clear();
        self.captures = FileCaptures::new();
        self.connect_task = None;
        self.timer = None;
    }

    /// Starts a session created from a client's handshake: connects to the destination and
    /// queues the login as the first frame for it.
    pub fn start(&mut self, received: ReceivedHandshake, ctx: &SessionContext) -> Result<(), RelayError> {
        let ReceivedHandshake { handshake, frame } = received;
        self.sub_version = handshake.sub_version;
        self.character_name = handshake.character_name;

        self.apply(SessionEvent::Connect, ctx)?;
        self.forward(Side::Client, frame, ctx)?;
        self.pump(Side::Client, ctx)
    }

    pub fn connect_succeeded(&mut self, channel: Channel, ctx: &SessionContext) -> Result<Transition, RelayError> {
        self.connect_task = None;
        let transition = self.apply(SessionEvent::ConnectSucceeded, ctx)?;
        self.server = Some(Endpoint::new(channel));
        Ok(transition)
    }

    pub fn connect_failed(&mut self, ctx: &SessionContext) -> Result<Transition, RelayError> {
        self.connect_task = None;
        self.apply(SessionEvent::ConnectFailed, ctx)
    }

    pub fn timeout_fired(&mut self, token: TimerToken, ctx: &SessionContext) -> Result<Transition, RelayError> {
        self.apply(SessionEvent::TimeoutFired(token), ctx)
    }

    pub fn delete(&mut self, ctx: &SessionContext) -> Result<Transition, RelayError> {
        self.apply(SessionEvent::Delete, ctx)
    }

    /// Drops the channel on `side` and detaches it. Bytes still queued for that side are lost.
    pub fn lose_channel(&mut self, side: Side, ctx: &SessionContext) -> Result<Transition, RelayError> {
        self.release(side);
        if side == Side::Server {
            self.pending_to_server.clear();
        }

        self.apply(SessionEvent::ChannelLost(side), ctx)
    }

    /// Attaches a new client channel, whose keys were already set up by its unlinked session.
    ///
    /// With the destination still attached the client only gets its config back. Otherwise the
    /// session reconnects and the login goes to the new destination with the real config in place
    /// of the token.
    pub fn resume_client(&mut self, endpoint: Endpoint, received: ReceivedHandshake, ctx: &SessionContext) -> Result<(), RelayError> {
        let ReceivedHandshake { handshake, frame } = received;
        if self.next_destination.is_none() {
            self.next_destination = ctx.services.resolver.resolve(&handshake);
        }

        self.apply(SessionEvent::Resumed(Side::Client), ctx)?;
        self.sub_version = handshake.sub_version;
        self.character_name = handshake.character_name;
        self.client = Some(endpoint);

        let protocol = ctx.services.protocol.as_ref();
        if self.machine.server_attached() {
            if let (Some(guild_card_number), Some(client)) = (self.guild_card_number, &mut self.client) {
                let tokenized = token::with_token(&self.config.data, self.id);
                match protocol.security_data(self.version, guild_card_number, &tokenized) {
                    Ok(frame) => client.send(frame),
                    Err(error) => warn!("Session {:#x} couldn't rebuild security data: {error}", self.id),
                }
            }

            if let (Some(client_id), Some(client)) = (self.lobby_client_id, &mut self.client) {
                match protocol.lobby_roster(self.version, client_id, &self.roster) {
                    Ok(frame) => client.send(frame),
                    Err(error) => warn!("Session {:#x} couldn't rebuild its lobby roster: {error}", self.id),
                }
            }
        } else {
            let login = match protocol.rewrite_handshake_config(self.version, &frame, &self.config.data) {
                Ok(login) => login,
                Err(error) => {
                    warn!("Session {:#x} couldn't restore the login config, forwarding as is: {error}", self.id);
                    frame
                }
            };

            self.pending_to_server.clear();
            self.forward(Side::Client, login, ctx)?;
        }

        self.pump(Side::Client, ctx)
    }

    /// Attaches a new destination channel. The destination is expected to open with a server
    /// init, and until then client frames are held back.
    pub fn resume_server(&mut self, channel: Channel, ctx: &SessionContext) -> Result<(), RelayError> {
        self.apply(SessionEvent::Resumed(Side::Server), ctx)?;
        self.pending_to_server.clear();
        self.server = Some(Endpoint::new(channel));
        Ok(())
    }

    /// Handles bytes read from the channel on `side`.
    pub fn receive(&mut self, side: Side, data: Vec<u8>, ctx: &SessionContext) -> Result<(), RelayError> {
        match self.endpoint_mut(side) {
            Some(endpoint) => endpoint.receive(data),
            None => {
                debug!("Session {:#x} got bytes for its missing {side} channel", self.id);
                return Ok(());
            }
        }

        self.pump(side, ctx)
    }

    /// Forwards every whole frame buffered on `side`.
    pub fn pump(&mut self, side: Side, ctx: &SessionContext) -> Result<(), RelayError> {
        let version = self.version;
        let protocol = ctx.services.protocol.as_ref();

        loop {
            let endpoint = match self.endpoint_mut(side) {
                Some(endpoint) => endpoint,
                None => return Ok(()),
            };

            let frame = match endpoint.next_frame(protocol, version)? {
                Some(frame) => frame,
                None => return Ok(()),
            };

            if side == Side::Server && !endpoint.has_crypt() {
                let keys = protocol.parse_server_init(version, &frame)?;
                endpoint.install_crypt(CryptPair::for_local_client(ctx.services.ciphers.as_ref(), keys));
                debug!("Session {:#x} destination keys set, flushing {} frames", self.id, self.pending_to_server.len());
                self.flush_pending();
                continue;
            }

            self.forward(side, frame, ctx)?;
        }
    }

    fn flush_pending(&mut self) {
        if let Some(server) = &mut self.server {
            while let Some(frame) = self.pending_to_server.pop_front() {
                server.send(frame);
            }
        }
    }

    fn forward(&mut self, from: Side, frame: Vec<u8>, ctx: &SessionContext) -> Result<(), RelayError> {
        let (direction, frame, redirected) = match from {
            Side::Client => (Direction::ClientToServer, frame, false),
            Side::Server => {
                let (frame, redirected) = self.observe(frame, ctx);
                (Direction::ServerToClient, frame, redirected)
            }
        };

        let context = HookContext {
            session_id: self.id,
            version: self.version,
            state: self.machine.state(),
        };

        let frame = ctx.services.hook.inspect(&context, direction, frame);
        if frame.is_empty() {
            debug!("Session {:#x} hook suppressed a {direction:?} frame", self.id);
        } else {
            match direction {
                Direction::ClientToServer => self.send_to_server(frame),
                Direction::ServerToClient => match &mut self.client {
                    Some(client) => client.send(frame),
                    None => debug!("Session {:#x} dropping {} bytes for the detached client", self.id, frame.len()),
                },
            }
        }

        if redirected {
            info!("Session {:#x} redirected to {:?}", self.id, self.next_destination);
            self.lose_channel(Side::Server, ctx)?;
        }

        Ok(())
    }

    fn send_to_server(&mut self, frame: Vec<u8>) {
        match &mut self.server {
            Some(server) if server.has_crypt() => server.send(frame),
            Some(_) => self.pending_to_server.push_back(frame),
            None if self.machine.state() == SessionState::Connecting => self.pending_to_server.push_back(frame),
            None => debug!("Session {:#x} dropping {} bytes for the detached destination", self.id, frame.len()),
        }
    }

    /// Looks at a destination frame, updating session state. Returns the frame to forward, and
    /// whether it was a redirect.
    fn observe(&mut self, frame: Vec<u8>, ctx: &SessionContext) -> (Vec<u8>, bool) {
        let protocol = ctx.services.protocol.as_ref();
        let event = match protocol.observe(self.version, Direction::ServerToClient, &frame) {
            Ok(event) => event,
            Err(error) => {
                warn!("Session {:#x} couldn't classify a destination frame, forwarding as is: {error}", self.id);
                return (frame, false);
            }
        };

        match event {
            FrameEvent::Other => (frame, false),
            FrameEvent::SecurityData {
                guild_card_number,
                client_config,
            } => {
                self.guild_card_number = Some(guild_card_number);
                self.config.data = client_config;
                let tokenized = token::with_token(&client_config, self.id);
                match protocol.rewrite_security_data(self.version, &frame, &tokenized) {
                    Ok(rewritten) => (rewritten, false),
                    Err(error) => {
                        warn!("Session {:#x} couldn't add its token to security data: {error}", self.id);
                        (frame, false)
                    }
                }
            }
            FrameEvent::Roster { client_id, players } => {
                debug!("Session {:#x} roster now has {} players, client in slot {client_id}", self.id, players.len());
                self.lobby_client_id = Some(client_id);
                self.roster = players;
                (frame, false)
            }
            FrameEvent::OpenFile { basename, size } => {
                self.open_capture(basename, size, ctx);
                (frame, false)
            }
            FrameEvent::FileChunk { basename, data } => {
                match self.captures.apply_chunk(&basename, &data) {
                    Ok(CaptureProgress::Completed { path }) => info!("Session {:#x} captured {}", self.id, path.display()),
                    Ok(_) => {}
                    Err(error) => warn!("Session {:#x} abandoned a capture: {error}", self.id),
                }

                (frame, false)
            }
            FrameEvent::Redirect(address) => {
                self.next_destination = Some(SocketAddr::V4(address));
                let local = self.client.as_ref().and_then(|c| c.channel.local_addr());
                let frame = match local {
                    Some(SocketAddr::V4(local)) => match protocol.rewrite_redirect(self.version, &frame, local) {
                        Ok(rewritten) => rewritten,
                        Err(error) => {
                            warn!("Session {:#x} couldn't rewrite a redirect: {error}", self.id);
                            frame
                        }
                    },
                    _ => frame,
                };

                (frame, true)
            }
        }
    }

    fn open_capture(&mut self, basename: String, size: u32, ctx: &SessionContext) {
        let dir = match &ctx.config.save_files_dir {
            Some(dir) => dir,
            None => return,
        };

        let path = capture_path(dir, self.id, &basename);
        let file = CaptureFile::create(path.clone());

        debug!("Session {:#x} capturing {size} bytes into {}", self.id, path.display());
        if let CaptureProgress::Completed { path } = self.captures.open(basename, path, file, size) {
            info!("Session {:#x} captured empty file {}", self.id, path.display());
        }
    }
}
