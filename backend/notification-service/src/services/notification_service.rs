/// Read-side notification operations
///
/// Listing, unread queries and read-state changes for the calling user. Ownership is
/// enforced here: a user can only change notifications they received.
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::NotificationStore;
use crate::error::{AppError, Result};
use crate::models::NotificationResponse;

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    recent_limit: i64,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, recent_limit: i64) -> Self {
        Self {
            store,
            recent_limit,
        }
    }

    /// Most recent notifications of `user_id`, newest first
    pub async fn get_recent(&self, user_id: Uuid) -> Result<Vec<NotificationResponse>> {
        self.ensure_user(user_id).await?;

        let notifications = self.store.find_recent(user_id, self.recent_limit).await?;
        Ok(notifications.into_iter().map(Into::into).collect())
    }

    pub async fn get_unread(&self, user_id: Uuid) -> Result<Vec<NotificationResponse>> {
        self.ensure_user(user_id).await?;

        let notifications = self.store.find_unread(user_id).await?;
        Ok(notifications.into_iter().map(Into::into).collect())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<usize> {
        Ok(self.get_unread(user_id).await?.len())
    }

    /// Mark one notification read on behalf of `user_id`
    ///
    /// Idempotent. A notification owned by someone else yields `AccessDenied` and is
    /// left untouched.
    pub async fn mark_read(&self, notification_id: i64, user_id: Uuid) -> Result<()> {
        let notification = self
            .store
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| AppError::notification_not_found(notification_id))?;

        if !notification.belongs_to(user_id) {
            debug!(
                notification_id,
                user_id = %user_id,
                "rejected read-state change on foreign notification"
            );
            return Err(AppError::AccessDenied);
        }

        if !notification.is_read && !self.store.mark_read(notification_id).await? {
            return Err(AppError::notification_not_found(notification_id));
        }
        Ok(())
    }

    /// Mark every notification of `user_id` read, returns how many changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.ensure_user(user_id).await?;

        let changed = self.store.mark_all_read(user_id).await?;
        info!(user_id = %user_id, changed, "marked all notifications read");
        Ok(changed)
    }

    pub async fn belongs_to(&self, notification_id: i64, user_id: Uuid) -> Result<bool> {
        self.store.belongs_to(notification_id, user_id).await
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        if self.store.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::user_not_found(user_id))
        }
    }
}
