use actix_web::{middleware, App, HttpServer};
use anyhow::Context;
use notification_service::{
    config::StoreBackend, db, logging, metrics, AppState, Config, MemoryNotificationStore,
    NotificationStore, PgNotificationStore,
};
use std::sync::Arc;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init_tracing(config.app.log_format);

    tracing::info!(
        env = %config.app.env,
        store = ?config.store,
        "starting notification service"
    );

    let store: Arc<dyn NotificationStore> = match config.store {
        StoreBackend::Postgres => {
            let pool = db::init_pool(&config.database)
                .await
                .context("Failed to initialize database")?;
            Arc::new(PgNotificationStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory notification store, data is lost on restart");
            Arc::new(MemoryNotificationStore::new())
        }
    };

    let state = AppState::new(store, &config);
    let hub = state.hub.clone();

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .configure(|cfg| state.configure(cfg))
    })
    .disable_signals()
    .shutdown_timeout(config.app.shutdown_timeout_secs)
    .bind(&addr)
    .with_context(|| format!("Failed to bind {}", addr))?
    .run();

    let server_handle = server.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");

        // stop accepting first, then close streams so the graceful stop can drain
        server_handle.pause().await;
        let closed = hub.shutdown().await;
        tracing::info!(closed, "notification streams closed");

        server_handle.stop(true).await;
    });

    server.await?;
    tracing::info!("Notification service stopped");
    Ok(())
}
