/// Domain event ingress from the review subsystem
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::models::{ReviewRef, UserRef};
use crate::services::Dispatcher;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLikedPayload {
    pub review_id: Uuid,
    pub review_owner_id: Uuid,
    pub liked_by_id: Uuid,
    pub liked_by_nickname: String,
}

/// A review received a like
///
/// POST /internal/v1/events/review-liked
///
/// Succeeds whenever the notification was persisted, whether or not any stream
/// received it.
pub async fn review_liked(
    dispatcher: web::Data<Dispatcher>,
    payload: web::Json<ReviewLikedPayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    if payload.liked_by_nickname.trim().is_empty() {
        return Err(AppError::BadRequest("likedByNickname must not be empty".into()));
    }

    let review = ReviewRef {
        id: payload.review_id,
        owner_id: payload.review_owner_id,
    };
    let liked_by = UserRef {
        id: payload.liked_by_id,
        nickname: payload.liked_by_nickname,
    };

    let outcome = dispatcher.notify_review_liked(&review, &liked_by).await?;
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(outcome)))
}
