/// Stream connection lifecycle
///
/// Opens connections (handshake, then registration), supervises each one on its own
/// tokio task until it reaches a terminal state, and runs the shared cleanup:
/// unregister from the registry and release the transport writer.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ConnectionState, FrameSink, StreamConnection, StreamFrame, SubscriptionRegistry};
use crate::config::StreamConfig;
use crate::error::{AppError, Result};
use crate::metrics;

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Lifetime ceiling of one connection
    pub connection_ttl: Duration,
    /// Interval between keep-alive comment frames
    pub keep_alive_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            connection_ttl: Duration::from_secs(60 * 60),
            keep_alive_interval: Duration::from_secs(30),
        }
    }
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            connection_ttl: Duration::from_secs(config.connection_ttl_secs),
            keep_alive_interval: Duration::from_secs(config.keep_alive_secs),
        }
    }
}

#[derive(Clone)]
pub struct StreamHub {
    registry: SubscriptionRegistry,
    settings: StreamSettings,
    /// Set once by `shutdown`; no connection may stay open afterwards
    closed: Arc<AtomicBool>,
}

impl StreamHub {
    pub fn new(registry: SubscriptionRegistry, settings: StreamSettings) -> Self {
        Self {
            registry,
            settings,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Open a stream for `user_id` over `sink`
    ///
    /// The acknowledgment frame is written before the connection is registered; if that
    /// write fails the connection ends `Errored` and is never visible to dispatch.
    /// Once the hub is shut down every open attempt fails with a transport error.
    pub async fn open(
        &self,
        user_id: Uuid,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Arc<StreamConnection>> {
        let connection = StreamConnection::new(user_id, sink);

        if self.is_closed() {
            self.terminate(&connection, ConnectionState::Completed).await;
            return Err(AppError::Transport("notification streams are shut down".into()));
        }

        if let Err(e) = connection.send(&StreamFrame::Connected).await {
            warn!(
                user_id = %user_id,
                connection_id = %connection.id(),
                error = %e,
                "failed to send stream acknowledgment"
            );
            self.terminate(&connection, ConnectionState::Errored).await;
            return Err(e);
        }

        self.registry.register(connection.clone());
        metrics::stream_opened();

        // shutdown may have taken its snapshot before this registration
        if self.is_closed() {
            self.terminate(&connection, ConnectionState::Completed).await;
            return Err(AppError::Transport("notification streams are shut down".into()));
        }

        info!(
            user_id = %user_id,
            connection_id = %connection.id(),
            "notification stream opened"
        );

        let hub = self.clone();
        let supervised = connection.clone();
        tokio::spawn(async move {
            hub.supervise(supervised).await;
        });

        Ok(connection)
    }

    /// Drive `connection` to `state` and clean up
    ///
    /// Safe to call any number of times from any task; only the first terminal transition
    /// counts, cleanup itself is idempotent. Returns true if this call made the transition.
    pub async fn terminate(
        &self,
        connection: &Arc<StreamConnection>,
        state: ConnectionState,
    ) -> bool {
        let transitioned = connection.transition(state);
        if self.registry.unregister(connection.user_id(), connection.id()) {
            metrics::stream_unregistered();
        }
        connection.release().await;

        if transitioned {
            let final_state = connection.state();
            metrics::stream_terminated(final_state);
            info!(
                user_id = %connection.user_id(),
                connection_id = %connection.id(),
                state = final_state.as_str(),
                lifetime_secs = (chrono::Utc::now() - connection.opened_at()).num_seconds(),
                "notification stream closed"
            );
        }
        transitioned
    }

    /// Terminate every open connection and refuse new ones, used on process shutdown
    pub async fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let connections = self.registry.all_connections();
        let mut closed = 0;

        for connection in &connections {
            if self.terminate(connection, ConnectionState::Completed).await {
                closed += 1;
            }
        }

        info!(closed, "closed notification streams for shutdown");
        closed
    }

    async fn supervise(self, connection: Arc<StreamConnection>) {
        let deadline = tokio::time::sleep(self.settings.connection_ttl);
        tokio::pin!(deadline);

        let mut keep_alive = tokio::time::interval_at(
            tokio::time::Instant::now() + self.settings.keep_alive_interval,
            self.settings.keep_alive_interval,
        );

        let outcome = loop {
            tokio::select! {
                _ = connection.terminated() => break connection.state(),
                _ = connection.peer_closed() => break ConnectionState::Completed,
                _ = &mut deadline => break ConnectionState::TimedOut,
                _ = keep_alive.tick() => {
                    if let Err(e) = connection.send(&StreamFrame::KeepAlive).await {
                        debug!(
                            connection_id = %connection.id(),
                            error = %e,
                            "keep-alive write failed"
                        );
                        break ConnectionState::Errored;
                    }
                }
            }
        };

        self.terminate(&connection, outcome).await;
    }
}
