use std::time::Duration;

use actix_web::web::Bytes;
use async_trait::async_trait;
use tokio::sync::{
    mpsc::{self, error::SendTimeoutError},
    Mutex,
};

use crate::error::{AppError, Result};

/// Write side of a push transport
///
/// The stream connection serializes calls to `send`, so an implementation only has to
/// write one complete frame per call.
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Write one encoded frame
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Resolves once the peer has gone away
    async fn closed(&self);

    /// Release the writer so the client response terminates
    async fn close(&self);
}

/// Sink backed by a bounded channel whose receiver is the HTTP response body
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    write_timeout: Duration,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>, write_timeout: Duration) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            write_timeout,
        }
    }

    /// Create a sink together with the receiver that feeds the response body
    pub fn channel(capacity: usize, write_timeout: Duration) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, write_timeout), rx)
    }

    async fn sender(&self) -> Option<mpsc::Sender<Bytes>> {
        self.tx.lock().await.clone()
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: Bytes) -> Result<()> {
        let tx = self
            .sender()
            .await
            .ok_or_else(|| AppError::Transport("stream already closed".into()))?;

        tx.send_timeout(frame, self.write_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    AppError::Transport("write timed out, client is not draining".into())
                }
                SendTimeoutError::Closed(_) => {
                    AppError::Transport("client disconnected".into())
                }
            })
    }

    async fn closed(&self) {
        if let Some(tx) = self.sender().await {
            tx.closed().await;
        }
    }

    async fn close(&self) {
        self.tx.lock().await.take();
    }
}
