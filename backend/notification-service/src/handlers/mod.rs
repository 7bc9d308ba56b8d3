/// HTTP handlers for notification service API
pub mod events;
pub mod notifications;
pub mod stream;

use actix_web::web;

pub use notifications::*;

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(notifications::get_notifications))
            .route("/unread", web::get().to(notifications::get_unread))
            .route("/read-all", web::post().to(notifications::mark_all_as_read))
            .route("/stream", web::get().to(stream::open_stream))
            .route("/stream/status", web::get().to(stream::stream_status))
            .route("/{id}/read", web::post().to(notifications::mark_as_read)),
    )
    .route("/api/v1/streams/metrics", web::get().to(stream::stream_stats))
    .route(
        "/internal/v1/events/review-liked",
        web::post().to(events::review_liked),
    );
}
