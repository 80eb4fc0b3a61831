mod state;

use std::fmt;

pub use crate::state::*;

/// The events that drive a linked session's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start the outbound connection to the destination. Only valid in `ClientOnly` with a client
    /// channel attached.
    Connect,

    /// The outbound connection was established and a destination channel attached.
    ConnectSucceeded,

    /// The outbound connection could not be established.
    ConnectFailed,

    /// The channel on the given side closed, errored, or was disconnected by the relay.
    ChannelLost(Side),

    /// A new channel was attached to the given side.
    Resumed(Side),

    /// The timer armed with this token fired.
    TimeoutFired(TimerToken),

    /// The session is being explicitly deleted.
    Delete,
}

/// What the user of the state machine has to do with the session's timer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    /// Leave the timer as it is, armed or not.
    Keep,

    /// (Re)arm the timer with this token, replacing any previously armed timer.
    Arm(TimerToken),

    /// Cancel the armed timer.
    Cancel,
}

/// The result of feeding an event to a [`SessionMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub timer: TimerChange,

    /// Whether an outbound connection to the destination must be started.
    pub start_connect: bool,

    /// Set when this transition closed the session.
    pub close_reason: Option<CloseReason>,
}

impl Transition {
    const fn remain(state: SessionState) -> Self {
        Self {
            from: state,
            to: state,
            timer: TimerChange::Keep,
            start_connect: false,
            close_reason: None,
        }
    }

    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }

    pub fn closed(&self) -> bool {
        self.close_reason.is_some()
    }
}

/// An event was fed to the state machine in a state where it makes no sense. The state machine is
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEvent {
    pub state: SessionState,
    pub event: SessionEvent,
}

impl fmt::Display for InvalidEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {:?} is not valid in state {}", self.event, self.state)
    }
}

impl std::error::Error for InvalidEvent {}

/// The lifecycle of a linked session, without any of its IO.
///
/// The machine tracks which sides have a channel attached and which timer token is currently
/// armed. The user is expected to keep its real channels and timer in sync with the
/// [`Transition`] values returned by [`SessionMachine::handle`].
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    client_attached: bool,
    server_attached: bool,
    armed_timer: Option<TimerToken>,
    next_token: u64,
}

impl SessionMachine {
    /// Creates a machine in the `ClientOnly` state. The timeout starts armed; the user must arm
    /// its timer with [`SessionMachine::armed_timer`] right after creation.
    pub const fn new(client_attached: bool) -> Self {
        Self {
            state: SessionState::ClientOnly,
            client_attached,
            server_attached: false,
            armed_timer: Some(TimerToken(0)),
            next_token: 1,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_attached(&self) -> bool {
        self.client_attached
    }

    pub fn server_attached(&self) -> bool {
        self.server_attached
    }

    pub fn is_attached(&self, side: Side) -> bool {
        match side {
            Side::Client => self.client_attached,
            Side::Server => self.server_attached,
        }
    }

    pub fn armed_timer(&self) -> Option<TimerToken> {
        self.armed_timer
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Transition, InvalidEvent> {
        use SessionEvent::*;
        use SessionState::*;

        let from = self.state;
        let mut transition = Transition::remain(from);

        let to = match (from, event) {
            (Closed, _) => return Ok(transition),

            (_, Delete) => {
                transition.timer = self.cancel_timer();
                transition.close_reason = Some(CloseReason::Deleted);
                Closed
            }

            (_, TimeoutFired(token)) => {
                if self.armed_timer != Some(token) {
                    return Ok(transition);
                }

                self.armed_timer = None;
                transition.close_reason = Some(CloseReason::TimeoutExpired);
                Closed
            }

            (ClientOnly, Connect) if self.client_attached => {
                transition.timer = self.arm_timer();
                transition.start_connect = true;
                Connecting
            }

            (Connecting, ConnectSucceeded) => {
                self.server_attached = true;
                match self.client_attached {
                    true => {
                        transition.timer = self.cancel_timer();
                        Relaying
                    }
                    false => {
                        transition.timer = self.arm_timer();
                        ClientDetached
                    }
                }
            }

            (Connecting, ConnectFailed) => {
                transition.timer = self.cancel_timer();
                transition.close_reason = Some(CloseReason::ConnectFailed);
                Closed
            }

            (Relaying, ChannelLost(Side::Client)) => {
                self.client_attached = false;
                transition.timer = self.arm_timer();
                ClientDetached
            }

            (Relaying, ChannelLost(Side::Server)) => {
                self.server_attached = false;
                transition.timer = self.arm_timer();
                ServerDetached
            }

            (ServerDetached, ChannelLost(Side::Client)) => {
                self.client_attached = false;
                transition.timer = self.arm_timer();
                ClientDetached
            }

            (ClientDetached, ChannelLost(Side::Server)) if self.server_attached => {
                self.server_attached = false;
                ClientDetached
            }

            (ClientOnly | Connecting, ChannelLost(Side::Client)) if self.client_attached => {
                self.client_attached = false;
                from
            }

            (ClientDetached, Resumed(Side::Client)) => {
                self.client_attached = true;
                match self.server_attached {
                    true => {
                        transition.timer = self.cancel_timer();
                        Relaying
                    }
                    false => {
                        transition.timer = self.arm_timer();
                        transition.start_connect = true;
                        Connecting
                    }
                }
            }

            (ClientOnly, Resumed(Side::Client)) if !self.client_attached => {
                self.client_attached = true;
                transition.timer = self.arm_timer();
                transition.start_connect = true;
                Connecting
            }

            (Connecting, Resumed(Side::Client)) if !self.client_attached => {
                self.client_attached = true;
                Connecting
            }

            (ServerDetached, Resumed(Side::Server)) => {
                self.server_attached = true;
                transition.timer = self.cancel_timer();
                Relaying
            }

            (ClientDetached, Resumed(Side::Server)) if !self.server_attached => {
                self.server_attached = true;
                ClientDetached
            }

            (state, event) => return Err(InvalidEvent { state, event }),
        };

        if to == Closed {
            self.client_attached = false;
            self.server_attached = false;
        }

        self.state = to;
        transition.to = to;
        Ok(transition)
    }

    fn arm_timer(&mut self) -> TimerChange {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.armed_timer = Some(token);
        TimerChange::Arm(token)
    }

    fn cancel_timer(&mut self) -> TimerChange {
        match self.armed_timer.take() {
            Some(_) => TimerChange::Cancel,
            None => TimerChange::Keep,
        }
    }
}
