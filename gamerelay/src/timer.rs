use std::time::Duration;

use gamerelay_link_sm::TimerToken;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::server::{EventSender, ServerEvent};

/// Owns a local task and aborts it when dropped.
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A session timeout. Posts [`ServerEvent::TimeoutFired`] once `duration` elapses, unless dropped
/// first.
#[derive(Debug)]
pub struct TimeoutGuard {
    token: TimerToken,
    _task: TaskGuard,
}

impl TimeoutGuard {
    pub fn arm(events: EventSender, session_id: u64, token: TimerToken, duration: Duration) -> Self {
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(duration).await;
            debug!("Timer {} for session {session_id:#x} fired", token.0);
            let _ = events.send(ServerEvent::TimeoutFired { session_id, token });
        });

        Self {
            token,
            _task: TaskGuard::new(handle),
        }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }
}
