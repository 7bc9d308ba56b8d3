use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::{FrameSink, StreamFrame};
use crate::error::{AppError, Result};

pub type ConnectionId = Uuid;

/// Lifecycle state of a stream connection
///
/// `Open` is the only non-terminal state. Every terminal state triggers the same cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ConnectionState {
    Open = 0,
    /// Client went away normally, or the process is shutting down
    Completed = 1,
    /// Lifetime ceiling reached
    TimedOut = 2,
    /// A write failed
    Errored = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Completed,
            2 => ConnectionState::TimedOut,
            _ => ConnectionState::Errored,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConnectionState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Open => "open",
            ConnectionState::Completed => "completed",
            ConnectionState::TimedOut => "timed_out",
            ConnectionState::Errored => "errored",
        }
    }
}

/// One long-lived push channel to one client
pub struct StreamConnection {
    id: ConnectionId,
    user_id: Uuid,
    opened_at: DateTime<Utc>,
    state: AtomicU8,
    sink: Arc<dyn FrameSink>,
    /// Held for the duration of one frame write
    write_lock: Mutex<()>,
    terminated: Notify,
}

impl StreamConnection {
    pub fn new(user_id: Uuid, sink: Arc<dyn FrameSink>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            opened_at: Utc::now(),
            state: AtomicU8::new(ConnectionState::Open as u8),
            sink,
            write_lock: Mutex::new(()),
            terminated: Notify::new(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Encode and write a single frame
    pub async fn send(&self, frame: &StreamFrame) -> Result<()> {
        self.send_encoded(frame.encode()?).await
    }

    /// Write an already encoded frame
    ///
    /// Concurrent callers are queued, each frame is written to completion before the next.
    pub async fn send_encoded(&self, frame: Bytes) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if !self.is_open() {
            return Err(AppError::Transport(format!(
                "connection {} is {}",
                self.id,
                self.state().as_str()
            )));
        }

        self.sink.send(frame).await
    }

    /// Move from `Open` to a terminal state
    ///
    /// Returns true for the single caller that performed the transition.
    pub fn transition(&self, next: ConnectionState) -> bool {
        if !next.is_terminal() {
            return false;
        }

        let won = self
            .state
            .compare_exchange(
                ConnectionState::Open as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if won {
            self.terminated.notify_waiters();
        }
        won
    }

    /// Resolves once the connection has left `Open`
    ///
    /// Any number of tasks may wait; all of them are woken by the transition.
    pub async fn terminated(&self) {
        let notified = self.terminated.notified();
        tokio::pin!(notified);
        // registered before the state check, a transition in between is not lost
        notified.as_mut().enable();

        if !self.is_open() {
            return;
        }
        notified.await;
    }

    /// Resolves once the client has gone away
    pub async fn peer_closed(&self) {
        self.sink.closed().await;
    }

    pub(crate) async fn release(&self) {
        self.sink.close().await;
    }
}

impl PartialEq for StreamConnection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamConnection {}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("opened_at", &self.opened_at)
            .field("state", &self.state())
            .finish()
    }
}
