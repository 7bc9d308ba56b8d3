use crate::error::Result;
use crate::middleware::UserId;
use crate::models::NotificationResponse;
use crate::services::NotificationService;
/// Notification read-side handlers
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadNotifications {
    pub notifications: Vec<NotificationResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResult {
    pub updated: u64,
}

/// Most recent notifications of the caller
///
/// GET /api/v1/notifications
pub async fn get_notifications(
    user: UserId,
    service: web::Data<Arc<NotificationService>>,
) -> Result<HttpResponse> {
    let notifications = service.get_recent(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notifications)))
}

/// Unread notifications of the caller and their count
///
/// GET /api/v1/notifications/unread
pub async fn get_unread(
    user: UserId,
    service: web::Data<Arc<NotificationService>>,
) -> Result<HttpResponse> {
    let notifications = service.get_unread(user.0).await?;
    let count = notifications.len();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UnreadNotifications {
        notifications,
        count,
    })))
}

/// Mark notification as read
///
/// POST /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    user: UserId,
    service: web::Data<Arc<NotificationService>>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let notification_id = path.into_inner();
    service.mark_read(notification_id, user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "id": notification_id }))))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_as_read(
    user: UserId,
    service: web::Data<Arc<NotificationService>>,
) -> Result<HttpResponse> {
    let updated = service.mark_all_read(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(MarkAllReadResult { updated })))
}
