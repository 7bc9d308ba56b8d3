/// Notification dispatch
///
/// Persist first, then push to whatever stream connections the receiver has open at
/// that moment. Delivery is best effort and at most once per connection: a failed write
/// prunes the connection and is never reported to the producer.
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::NotificationStore;
use crate::error::Result;
use crate::metrics;
use crate::models::{NotificationEvent, ReviewRef, UserRef};
use crate::stream::{ConnectionState, StreamFrame, StreamHub};

/// What a single `notify` call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Sender and receiver are the same user; nothing stored, nothing pushed
    SelfNotification,
    #[serde(rename_all = "camelCase")]
    Dispatched {
        notification_id: i64,
        /// Connections that received the frame
        delivered: usize,
        /// Connections whose write failed and were closed
        pruned: usize,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    hub: StreamHub,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, hub: StreamHub) -> Self {
        Self { store, hub }
    }

    /// Persist `event` and push it to the receiver's open streams
    ///
    /// Fails only when the notification could not be persisted.
    pub async fn notify(&self, event: NotificationEvent) -> Result<DispatchOutcome> {
        if event.is_self_notification() {
            debug!(user_id = %event.receiver_id, "skipping self notification");
            return Ok(DispatchOutcome::SelfNotification);
        }

        let receiver_id = event.receiver_id;
        let notification = self.store.save(event.into_new_notification()).await?;
        metrics::notification_persisted();

        let connections = self.hub.registry().snapshot(receiver_id);
        if connections.is_empty() {
            debug!(
                notification_id = notification.id,
                user_id = %receiver_id,
                "receiver offline, notification stored only"
            );
            return Ok(DispatchOutcome::Dispatched {
                notification_id: notification.id,
                delivered: 0,
                pruned: 0,
            });
        }

        let frame = StreamFrame::notification(&notification).encode()?;

        let writes = connections.iter().map(|connection| {
            let frame = frame.clone();
            async move { (connection, connection.send_encoded(frame).await) }
        });

        let mut delivered = 0;
        let mut pruned = 0;
        for (connection, result) in join_all(writes).await {
            match result {
                Ok(()) => {
                    metrics::push_delivered();
                    delivered += 1;
                }
                Err(e) => {
                    metrics::push_failed();
                    warn!(
                        notification_id = notification.id,
                        user_id = %receiver_id,
                        connection_id = %connection.id(),
                        error = %e,
                        "push failed, closing stream connection"
                    );
                    self.hub.terminate(connection, ConnectionState::Errored).await;
                    pruned += 1;
                }
            }
        }

        info!(
            notification_id = notification.id,
            user_id = %receiver_id,
            delivered,
            pruned,
            "notification dispatched"
        );

        Ok(DispatchOutcome::Dispatched {
            notification_id: notification.id,
            delivered,
            pruned,
        })
    }

    /// Ingress used by the review subsystem when a review gets a like
    pub async fn notify_review_liked(
        &self,
        review: &ReviewRef,
        liked_by: &UserRef,
    ) -> Result<DispatchOutcome> {
        self.notify(NotificationEvent::review_liked(review, liked_by))
            .await
    }
}
