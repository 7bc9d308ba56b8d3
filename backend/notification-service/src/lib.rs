pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod stream;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

pub use config::Config;
pub use error::{AppError, Result};
pub use services::*;
pub use stream::{StreamHub, StreamSettings, SubscriptionRegistry};

/// Shared application state, handed to every actix worker
#[derive(Clone)]
pub struct AppState {
    pub hub: StreamHub,
    pub dispatcher: Dispatcher,
    pub notifications: Arc<NotificationService>,
    pub stream_config: config::StreamConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn NotificationStore>, config: &Config) -> Self {
        let hub = StreamHub::new(
            SubscriptionRegistry::new(),
            StreamSettings::from(&config.stream),
        );

        Self {
            dispatcher: Dispatcher::new(store.clone(), hub.clone()),
            notifications: Arc::new(NotificationService::new(
                store,
                config.notifications.recent_limit,
            )),
            stream_config: config.stream.clone(),
            hub,
        }
    }

    /// Register state and every route on an actix app
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.hub.clone()))
            .app_data(web::Data::new(self.dispatcher.clone()))
            .app_data(web::Data::new(self.notifications.clone()))
            .app_data(web::Data::new(self.stream_config.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::register_routes)
            .default_service(web::to(not_found));
    }
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(handlers::ApiResponse::<()>::err("NOT_FOUND".to_string()))
}
