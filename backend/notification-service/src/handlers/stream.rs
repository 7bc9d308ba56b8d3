/// Server-Sent Events endpoints
use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::header, web, HttpResponse};
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::ApiResponse;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::middleware::UserId;
use crate::stream::{ChannelSink, StreamHub};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub user_id: Uuid,
    pub connected: bool,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub total_connections: usize,
    pub connected_users: usize,
}

/// Open a notification stream for the caller
///
/// GET /api/v1/notifications/stream
///
/// The response body is fed by the connection's frame channel; it ends when the
/// connection reaches a terminal state.
pub async fn open_stream(
    user: UserId,
    hub: web::Data<StreamHub>,
    config: web::Data<StreamConfig>,
) -> Result<HttpResponse> {
    let (sink, rx) = ChannelSink::channel(
        config.channel_capacity,
        Duration::from_millis(config.write_timeout_ms),
    );

    hub.open(user.0, Arc::new(sink)).await?;

    let body = ReceiverStream::new(rx).map(Ok::<_, actix_web::Error>);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}

/// GET /api/v1/notifications/stream/status
pub async fn stream_status(user: UserId, hub: web::Data<StreamHub>) -> HttpResponse {
    let connections = hub.registry().connection_count(user.0);

    HttpResponse::Ok().json(ApiResponse::ok(StreamStatus {
        user_id: user.0,
        connected: connections > 0,
        connections,
    }))
}

/// GET /api/v1/streams/metrics
pub async fn stream_stats(hub: web::Data<StreamHub>) -> HttpResponse {
    let registry = hub.registry();

    HttpResponse::Ok().json(ApiResponse::ok(StreamStats {
        total_connections: registry.total_connections(),
        connected_users: registry.connected_users_count(),
    }))
}
