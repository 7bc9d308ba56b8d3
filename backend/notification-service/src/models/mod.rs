use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enumeration
///
/// Closed set: adding a variant means adding a producer for it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Someone liked one of the receiver's reviews
    ReviewLiked,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ReviewLiked => "REVIEW_LIKED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REVIEW_LIKED" => Some(NotificationType::ReviewLiked),
            _ => None,
        }
    }
}

/// Persisted notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Store-assigned identifier, also used as the SSE event id
    pub id: i64,

    /// Recipient user ID
    pub receiver_id: Uuid,

    /// Acting user ID (if any)
    pub sender_id: Option<Uuid>,

    /// Acting user's nickname, resolved at read time
    pub sender_display_name: Option<String>,

    /// Related review (if any)
    pub review_id: Option<Uuid>,

    pub notification_type: NotificationType,

    pub message: String,

    /// Only ever moves from false to true
    pub is_read: bool,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.receiver_id == user_id
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}

/// Notification about to be persisted; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub receiver_id: Uuid,
    pub sender_id: Option<Uuid>,
    /// Nickname known to the producer, used when the store cannot resolve one
    pub sender_display_name: Option<String>,
    pub review_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub message: String,
}

/// Client-facing notification entry
///
/// Shared by the `GetRecent` listing and the payload of pushed `notification` frames,
/// so clients can dedupe a pushed frame against a later listing by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub read: bool,
    pub review_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub sender_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            notification_type: notification.notification_type,
            message: notification.message.clone(),
            read: notification.is_read,
            review_id: notification.review_id,
            sender_id: notification.sender_id,
            sender_nickname: notification.sender_display_name.clone(),
            created_at: notification.created_at,
        }
    }
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        NotificationResponse::from(&notification)
    }
}

/// Domain event handed to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub receiver_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub sender_display_name: Option<String>,
    pub review_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub message: String,
}

impl NotificationEvent {
    pub fn review_liked(review: &ReviewRef, liked_by: &UserRef) -> Self {
        Self {
            receiver_id: review.owner_id,
            sender_id: Some(liked_by.id),
            sender_display_name: Some(liked_by.nickname.clone()),
            review_id: Some(review.id),
            notification_type: NotificationType::ReviewLiked,
            message: format!("{} liked your review.", liked_by.nickname),
        }
    }

    /// True when the acting user is the receiver; such events are dropped.
    pub fn is_self_notification(&self) -> bool {
        self.sender_id == Some(self.receiver_id)
    }

    pub fn into_new_notification(self) -> NewNotification {
        NewNotification {
            receiver_id: self.receiver_id,
            sender_id: self.sender_id,
            sender_display_name: self.sender_display_name,
            review_id: self.review_id,
            notification_type: self.notification_type,
            message: self.message,
        }
    }
}

/// The liked review, as seen by the review subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRef {
    pub id: Uuid,
    pub owner_id: Uuid,
}

/// The acting user, as seen by the review subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub nickname: String,
}
