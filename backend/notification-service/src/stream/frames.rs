/// Server-Sent Events frames pushed to notification streams
use actix_web::web::Bytes;

use crate::error::Result;
use crate::models::{Notification, NotificationResponse};

/// Event name of the connection acknowledgment frame
pub const CONNECTED_EVENT: &str = "INIT";

/// Event name of domain notification frames
pub const NOTIFICATION_EVENT: &str = "notification";

/// Frames written to a stream connection
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Sent once right after the stream opens; carries no payload of consequence
    Connected,

    /// One persisted notification; the frame id is the notification id
    Notification(NotificationResponse),

    /// SSE comment used to detect half-dead connections between events
    KeepAlive,
}

impl StreamFrame {
    pub fn notification(notification: &Notification) -> Self {
        StreamFrame::Notification(NotificationResponse::from(notification))
    }

    /// SSE `event:` name, `None` for comment frames
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            StreamFrame::Connected => Some(CONNECTED_EVENT),
            StreamFrame::Notification(_) => Some(NOTIFICATION_EVENT),
            StreamFrame::KeepAlive => None,
        }
    }

    /// Encode into the `text/event-stream` wire format
    pub fn encode(&self) -> Result<Bytes> {
        let encoded = match self {
            StreamFrame::Connected => format!("event: {}\ndata: connected\n\n", CONNECTED_EVENT),
            StreamFrame::Notification(payload) => format!(
                "id: {}\nevent: {}\ndata: {}\n\n",
                payload.id,
                NOTIFICATION_EVENT,
                serde_json::to_string(payload)?
            ),
            StreamFrame::KeepAlive => ": keep-alive\n\n".to_string(),
        };

        Ok(Bytes::from(encoded))
    }
}
