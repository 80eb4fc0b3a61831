//! The session registry and its event loop.
//!
//! [`ProxyServer`] owns every listener, unlinked session and linked session. IO happens in local
//! tasks that only post [`ServerEvent`]s; the server handles each event to completion without
//! awaiting, so nothing else touches its tables in between.

use std::{collections::HashMap, net::SocketAddr, rc::Rc};

use gamerelay_link_sm::{CloseReason, Side};
use gamerelay_proto::version::GameVersion;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};
use tracing::{debug, error, info, warn};

use crate::{
    channel::{Channel, ChannelId},
    config::ProxyConfig,
    error::{ParseError, RelayError},
    protocol::Services,
    session::{token, ClientConfig, License, LinkedSession, ReceivedHandshake, SessionContext, UnlinkedSession},
};

mod events;
mod listener;

pub use events::*;
pub use listener::*;

pub struct ProxyServer {
    ctx: SessionContext,
    listeners: HashMap<u16, ListeningSocket>,
    unlinked: HashMap<ChannelId, UnlinkedSession>,
    routes: HashMap<ChannelId, (u64, Side)>,
    sessions: HashMap<u64, LinkedSession>,
    next_session_id: u64,
    next_channel_id: u64,
    events_rx: EventReceiver,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, services: Services) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            ctx: SessionContext {
                services,
                config,
                events: events_tx,
            },
            listeners: HashMap::new(),
            unlinked: HashMap::new(),
            routes: HashMap::new(),
            sessions: HashMap::new(),
            next_session_id: 1,
            next_channel_id: 1,
            events_rx,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.ctx.config
    }

    fn allocate_channel_id(&mut self) -> ChannelId {
        let id = ChannelId(self.next_channel_id);
        self.next_channel_id += 1;
        id
    }

    fn allocate_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    /// Starts accepting connections on `port` for game `version`. Returns the bound address,
    /// whose port is the one to use with the rest of the API when `port` is 0.
    ///
    /// Listening twice on the same port is an error, the first listener stays.
    pub fn listen(&mut self, port: u16, version: GameVersion, default_destination: Option<SocketAddr>) -> Result<SocketAddr, RelayError> {
        if port != 0 && self.listeners.contains_key(&port) {
            return Err(RelayError::PortInUse(port));
        }

        let listener = ListeningSocket::bind(port, version, default_destination, self.ctx.events.clone())?;
        let local_addr = listener.local_addr();
        if self.listeners.contains_key(&listener.port()) {
            return Err(RelayError::PortInUse(listener.port()));
        }

        match default_destination {
            Some(destination) => info!("Listening for {version} clients on {local_addr}, relaying to {destination}"),
            None => info!("Listening for {version} clients on {local_addr}"),
        }

        self.listeners.insert(listener.port(), listener);
        Ok(local_addr)
    }

    pub fn listening_ports(&self) -> Vec<u16> {
        self.listeners.keys().copied().collect()
    }

    /// Treats `stream` as if it had just been accepted on `port`.
    pub fn connect_client<S>(&mut self, stream: S, port: u16) -> Result<ChannelId, RelayError>
    where
        S: AsyncRead + AsyncWrite + 'static,
    {
        if !self.listeners.contains_key(&port) {
            return Err(RelayError::NoListener(port));
        }

        let id = self.allocate_channel_id();
        let channel = Channel::spawn(id, stream, None, self.ctx.events.clone());
        self.start_unlinked(channel, port);
        Ok(id)
    }

    fn start_unlinked(&mut self, channel: Channel, port: u16) {
        let (version, default_destination) = match self.listeners.get(&port) {
            Some(listener) => (listener.version(), listener.default_destination()),
            None => return,
        };

        let id = channel.id();
        match UnlinkedSession::start(channel, port, version, default_destination, &self.ctx.services) {
            Ok(unlinked) => {
                debug!("Channel {id} waiting for a handshake on port {port}");
                self.unlinked.insert(id, unlinked);
            }
            Err(error) => warn!("Couldn't start a session on channel {id}: {error}"),
        }
    }

    /// Creates a session with no channels in `ClientOnly`. A client joins it by logging in with
    /// [`LinkedSession::resume_token_config`] as its config.
    pub fn create_licensed_session(&mut self, license: Rc<License>, port: u16, version: GameVersion, config: ClientConfig) -> &mut LinkedSession {
        let id = self.allocate_session_id();
        let default_destination = self.listeners.get(&port).and_then(|l| l.default_destination());
        let session = LinkedSession::new(id, port, version, Some(license), config, None, default_destination, &self.ctx);
        info!("Created licensed session {id:#x} on port {port}");
        self.sessions.entry(id).or_insert(session)
    }

    /// Closes a session and everything it owns. Unknown ids are ignored.
    pub fn delete_session(&mut self, id: u64) {
        let ctx = &self.ctx;

        if let Some(session) = self.sessions.get_mut(&id) {
            if let Err(error) = session.delete(ctx) {
                warn!("Deleting session {id:#x}: {error}");
            }
        }

        self.finish_session_op(id);
    }

    /// Some linked session, with no guarantee as to which.
    pub fn get_session(&self) -> Option<&LinkedSession> {
        self.sessions.values().next()
    }

    pub fn session(&self, id: u64) -> Option<&LinkedSession> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: u64) -> Option<&mut LinkedSession> {
        self.sessions.get_mut(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn unlinked_count(&self) -> usize {
        self.unlinked.len()
    }

    /// Attaches a new destination connection to a session whose destination went away.
    pub fn resume_destination<S>(&mut self, id: u64, stream: S) -> Result<ChannelId, RelayError>
    where
        S: AsyncRead + AsyncWrite + 'static,
    {
        if !self.sessions.contains_key(&id) {
            return Err(RelayError::UnknownSession(id));
        }

        let channel_id = self.allocate_channel_id();
        let channel = Channel::spawn(channel_id, stream, None, self.ctx.events.clone());
        let ctx = &self.ctx;

        let result = match self.sessions.get_mut(&id) {
            Some(session) => session.resume_server(channel, ctx),
            None => Err(RelayError::UnknownSession(id)),
        };

        if result.is_ok() {
            self.routes.insert(channel_id, (id, Side::Server));
        }

        self.finish_session_op(id);
        result.map(|()| channel_id)
    }

    /// Waits for the next event and handles it. Cancel-safe.
    pub async fn process_next_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
    }

    pub async fn run(&mut self) {
        loop {
            self.process_next_event().await;
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Accepted { port, stream, peer } => self.on_accepted(port, stream, peer),
            ServerEvent::ListenerFailed { port, error } => {
                error!("Listener on port {port} failed, no longer accepting there: {error}");
                self.listeners.remove(&port);
            }
            ServerEvent::ChannelInput { channel, data } => self.on_channel_input(channel, data),
            ServerEvent::ChannelClosed { channel, error } => self.on_channel_closed(channel, RelayError::from_channel_close(error)),
            ServerEvent::ConnectCompleted {
                session_id,
                destination,
                result,
            } => self.on_connect_completed(session_id, destination, result),
            ServerEvent::TimeoutFired { session_id, token } => {
                let ctx = &self.ctx;

                if let Some(session) = self.sessions.get_mut(&session_id) {
                    match session.timeout_fired(token, ctx) {
                        Ok(t) if t.close_reason == Some(CloseReason::TimeoutExpired) => {
                            info!("Session {session_id:#x} reclaimed: {}", RelayError::TimeoutExpired)
                        }
                        Ok(_) => debug!("Ignoring stale timer {} for session {session_id:#x}", token.0),
                        Err(error) => warn!("Session {session_id:#x} timer: {error}"),
                    }
                }

                self.finish_session_op(session_id);
            }
        }
    }

    fn on_accepted(&mut self, port: u16, stream: TcpStream, peer: SocketAddr) {
        if !self.listeners.contains_key(&port) {
            debug!("Dropping connection from {peer}, port {port} is no longer listened on");
            return;
        }

        let id = self.allocate_channel_id();
        info!("Client {peer} connected on port {port} as channel {id}");
        let channel = Channel::from_tcp(id, stream, self.ctx.events.clone());
        self.start_unlinked(channel, port);
    }

    fn on_channel_input(&mut self, channel: ChannelId, data: Vec<u8>) {
        if let Some(mut unlinked) = self.unlinked.remove(&channel) {
            match unlinked.receive(data, &self.ctx.services) {
                Ok(None) => {
                    self.unlinked.insert(channel, unlinked);
                }
                Ok(Some(received)) => self.on_handshake(channel, unlinked, received),
                Err(error) => warn!("Disconnecting channel {channel}, bad handshake: {error}"),
            }

            return;
        }

        let (session_id, side) = match self.route(channel) {
            Some(route) => route,
            None => {
                debug!("Dropping {} bytes from unknown channel {channel}", data.len());
                return;
            }
        };

        let ctx = &self.ctx;

        if let Some(session) = self.sessions.get_mut(&session_id) {
            if let Err(error) = session.receive(side, data, ctx) {
                warn!("Session {session_id:#x} disconnecting its {side} channel: {error}");
                if let Err(error) = session.lose_channel(side, ctx) {
                    warn!("Session {session_id:#x}: {error}");
                }
            }
        }

        self.finish_session_op(session_id);
    }

    fn on_channel_closed(&mut self, channel: ChannelId, reason: RelayError) {
        if self.unlinked.remove(&channel).is_some() {
            debug!("Channel {channel} closed before its handshake: {reason}");
            return;
        }

        let (session_id, side) = match self.route(channel) {
            Some(route) => route,
            None => return,
        };

        let ctx = &self.ctx;

        if let Some(session) = self.sessions.get_mut(&session_id) {
            info!("Session {session_id:#x} lost its {side} channel: {reason}");
            if let Err(error) = session.lose_channel(side, ctx) {
                warn!("Session {session_id:#x}: {error}");
            }
        }

        self.finish_session_op(session_id);
    }

    fn on_connect_completed(&mut self, session_id: u64, destination: Option<SocketAddr>, result: std::io::Result<TcpStream>) {
        if !self.sessions.contains_key(&session_id) {
            debug!("Connection for gone session {session_id:#x} completed, dropping it");
            return;
        }

        let channel = match result {
            Ok(stream) => {
                let id = self.allocate_channel_id();
                Some(Channel::from_tcp(id, stream, self.ctx.events.clone()))
            }
            Err(source) => {
                warn!("Session {session_id:#x}: {}", RelayError::Connect { destination, source });
                None
            }
        };

        let ctx = &self.ctx;

        if let Some(session) = self.sessions.get_mut(&session_id) {
            let result = match channel {
                Some(channel) => {
                    let channel_id = channel.id();
                    let result = session.connect_succeeded(channel, ctx);
                    if result.is_ok() {
                        self.routes.insert(channel_id, (session_id, Side::Server));
                    }
                    result
                }
                None => session.connect_failed(ctx),
            };

            if let Err(error) = result {
                warn!("Session {session_id:#x}: {error}");
            }
        }

        self.finish_session_op(session_id);
    }

    /// Turns a handshaken unlinked session into a new linked session, or hands its channel to
    /// the session it resumes.
    fn on_handshake(&mut self, channel: ChannelId, unlinked: UnlinkedSession, received: ReceivedHandshake) {
        let result = match token::extract(&received.handshake.client_config) {
            Some(session_id) => self.resume_session(channel, session_id, unlinked, received),
            None => self.create_session(channel, unlinked, received),
        };

        if let Err(error) = result {
            warn!("Disconnecting channel {channel}: {error}");
        }
    }

    fn create_session(&mut self, channel: ChannelId, unlinked: UnlinkedSession, received: ReceivedHandshake) -> Result<(), RelayError> {
        let handshake = &received.handshake;
        let destination = unlinked
            .default_destination()
            .or_else(|| self.ctx.services.resolver.resolve(handshake))
            .ok_or(ParseError::NoDestination)?;

        let id = self.allocate_session_id();
        let license = Rc::new(License::new(handshake.serial_number, handshake.access_key.clone()));
        let (port, version) = (unlinked.port(), unlinked.version());
        let ctx = &self.ctx;

        let endpoint = unlinked.into_endpoint();
        let mut session = LinkedSession::new(id, port, version, Some(license), ClientConfig::default(), Some(endpoint), Some(destination), ctx);
        info!("Channel {channel} started session {id:#x} to {destination}");

        let result = session.start(received, ctx);
        if result.is_err() {
            if let Err(error) = session.lose_channel(Side::Client, ctx) {
                warn!("Session {id:#x}: {error}");
            }
        }

        self.routes.insert(channel, (id, Side::Client));
        self.sessions.insert(id, session);
        self.finish_session_op(id);
        result
    }

    fn resume_session(&mut self, channel: ChannelId, session_id: u64, unlinked: UnlinkedSession, received: ReceivedHandshake) -> Result<(), RelayError> {
        let ctx = &self.ctx;

        let session = match self.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return Err(ParseError::UnknownSession(session_id).into()),
        };

        if let Some(license) = session.license() {
            if license.serial_number != received.handshake.serial_number {
                return Err(ParseError::LicenseMismatch {
                    expected: license.serial_number,
                    actual: received.handshake.serial_number,
                }
                .into());
            }
        }

        info!("Channel {channel} resuming session {session_id:#x}");
        let result = session.resume_client(unlinked.into_endpoint(), received, ctx);
        if session.channel_id(Side::Client) == Some(channel) {
            match result.is_ok() {
                true => {
                    self.routes.insert(channel, (session_id, Side::Client));
                }
                false => {
                    if let Err(error) = session.lose_channel(Side::Client, ctx) {
                        warn!("Session {session_id:#x}: {error}");
                    }
                }
            }
        }

        self.finish_session_op(session_id);
        result
    }

    /// Looks up who owns a channel. Routes to channels a session no longer holds are dropped.
    fn route(&mut self, channel: ChannelId) -> Option<(u64, Side)> {
        let (session_id, side) = *self.routes.get(&channel)?;
        let current = self.sessions.get(&session_id).and_then(|s| s.channel_id(side));
        match current == Some(channel) {
            true => Some((session_id, side)),
            false => {
                self.routes.remove(&channel);
                None
            }
        }
    }

    /// Drops routes to channels the session released, and the session itself if it closed.
    fn finish_session_op(&mut self, session_id: u64) {
        let session = match self.sessions.get_mut(&session_id) {
            Some(session) => session,
            None => return,
        };

        for channel in session.take_released_channels() {
            self.routes.remove(&channel);
        }

        if session.state().is_closed() {
            self.sessions.remove(&session_id);
            self.routes.retain(|_, (id, _)| *id != session_id);
            info!("Session {session_id:#x} removed, {} sessions left", self.sessions.len());
        }
    }
}
