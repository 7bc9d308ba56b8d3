/// Notification persistence
///
/// `NotificationStore` is the only way the rest of the service touches stored
/// notifications. PostgreSQL backs production; the in-memory store backs local
/// development and tests.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{NewNotification, Notification, NotificationType};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification, assigning its id and creation time
    async fn save(&self, new: NewNotification) -> Result<Notification>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// Newest first, ties broken by id descending
    async fn find_recent(&self, receiver_id: Uuid, limit: i64) -> Result<Vec<Notification>>;

    async fn find_unread(&self, receiver_id: Uuid) -> Result<Vec<Notification>>;

    /// Returns false if no such notification exists
    async fn mark_read(&self, id: i64) -> Result<bool>;

    /// Returns the number of notifications that changed
    async fn mark_all_read(&self, receiver_id: Uuid) -> Result<u64>;

    async fn belongs_to(&self, notification_id: i64, user_id: Uuid) -> Result<bool>;

    async fn user_exists(&self, user_id: Uuid) -> Result<bool>;
}

const SELECT_COLUMNS: &str = r#"
    n.id, n.receiver_id, n.sender_id, n.review_id, n.notification_type,
    n.message, n.is_read, n.created_at, u.nickname AS sender_nickname
"#;

pub struct PgNotificationStore {
    db: PgPool,
}

impl PgNotificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn row_to_notification(row: &PgRow) -> Result<Notification> {
        let raw_type: String = row.try_get("notification_type")?;
        let notification_type = NotificationType::parse(&raw_type).ok_or_else(|| {
            AppError::Persistence(format!("unknown notification type '{}'", raw_type))
        })?;

        Ok(Notification {
            id: row.try_get("id")?,
            receiver_id: row.try_get("receiver_id")?,
            sender_id: row.try_get("sender_id")?,
            sender_display_name: row.try_get("sender_nickname")?,
            review_id: row.try_get("review_id")?,
            notification_type,
            message: row.try_get("message")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn save(&self, new: NewNotification) -> Result<Notification> {
        let query = format!(
            r#"
            WITH n AS (
                INSERT INTO notifications (
                    receiver_id, sender_id, review_id, notification_type, message
                ) VALUES ($1, $2, $3, $4, $5)
                RETURNING id, receiver_id, sender_id, review_id, notification_type,
                          message, is_read, created_at
            )
            SELECT {}
            FROM n
            LEFT JOIN users u ON u.id = n.sender_id
            "#,
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(new.receiver_id)
            .bind(new.sender_id)
            .bind(new.review_id)
            .bind(new.notification_type.as_str())
            .bind(&new.message)
            .fetch_one(&self.db)
            .await?;

        let mut notification = Self::row_to_notification(&row)?;
        if notification.sender_display_name.is_none() {
            notification.sender_display_name = new.sender_display_name;
        }

        debug!(
            notification_id = notification.id,
            receiver_id = %notification.receiver_id,
            "notification saved"
        );
        Ok(notification)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications n
            LEFT JOIN users u ON u.id = n.sender_id
            WHERE n.id = $1
            "#,
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::row_to_notification).transpose()
    }

    async fn find_recent(&self, receiver_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications n
            LEFT JOIN users u ON u.id = n.sender_id
            WHERE n.receiver_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(receiver_id)
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn find_unread(&self, receiver_id: Uuid) -> Result<Vec<Notification>> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications n
            LEFT JOIN users u ON u.id = n.sender_id
            WHERE n.receiver_id = $1 AND n.is_read = FALSE
            ORDER BY n.created_at DESC, n.id DESC
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(receiver_id)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn mark_read(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, receiver_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE receiver_id = $1 AND is_read = FALSE",
        )
        .bind(receiver_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn belongs_to(&self, notification_id: i64, user_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1 AND receiver_id = $2) AS owned",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_get("owned")?)
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1) AS present")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(row.try_get("present")?)
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    notifications: Vec<Notification>,
    users: HashMap<Uuid, String>,
}

/// Process-local store
///
/// Mirrors the relational constraints that matter to callers: the receiver must be a
/// known user, and sender nicknames are resolved from the user table.
#[derive(Default)]
pub struct MemoryNotificationStore {
    state: RwLock<MemoryState>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user_id: Uuid, nickname: impl Into<String>) {
        self.state.write().await.users.insert(user_id, nickname.into());
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.notifications.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn newest_first(mut notifications: Vec<Notification>) -> Vec<Notification> {
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        notifications
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn save(&self, new: NewNotification) -> Result<Notification> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&new.receiver_id) {
            return Err(AppError::Persistence(format!(
                "receiver {} does not exist",
                new.receiver_id
            )));
        }

        let sender_display_name = match new.sender_id {
            Some(sender_id) => match state.users.get(&sender_id) {
                Some(nickname) => Some(nickname.clone()),
                None => {
                    return Err(AppError::Persistence(format!(
                        "sender {} does not exist",
                        sender_id
                    )))
                }
            },
            None => new.sender_display_name,
        };

        state.next_id += 1;

        let notification = Notification {
            id: state.next_id,
            receiver_id: new.receiver_id,
            sender_id: new.sender_id,
            sender_display_name,
            review_id: new.review_id,
            notification_type: new.notification_type,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());

        Ok(notification)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let state = self.state.read().await;
        Ok(state.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn find_recent(&self, receiver_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        let owned = state
            .notifications
            .iter()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .collect();

        let mut recent = Self::newest_first(owned);
        recent.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(recent)
    }

    async fn find_unread(&self, receiver_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        let unread = state
            .notifications
            .iter()
            .filter(|n| n.receiver_id == receiver_id && !n.is_read)
            .cloned()
            .collect();

        Ok(Self::newest_first(unread))
    }

    async fn mark_read(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.mark_read();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, receiver_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.receiver_id == receiver_id && !n.is_read)
        {
            notification.mark_read();
            changed += 1;
        }
        Ok(changed)
    }

    async fn belongs_to(&self, notification_id: i64, user_id: Uuid) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .any(|n| n.id == notification_id && n.belongs_to(user_id)))
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.users.contains_key(&user_id))
    }
}
