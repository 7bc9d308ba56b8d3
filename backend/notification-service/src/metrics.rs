use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder,
};

use crate::stream::ConnectionState;

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_http_requests_total",
            "Total HTTP requests handled by notification-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "notification_service_http_request_duration_seconds",
            "HTTP request latency for notification-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create notification_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register notification_service_http_request_duration_seconds");
    histogram
});

static OPEN_STREAMS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "notification_service_open_streams",
        "Stream connections currently registered",
    )
    .expect("failed to create notification_service_open_streams");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register notification_service_open_streams");
    gauge
});

static STREAM_TERMINATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_stream_terminations_total",
            "Stream connections that reached a terminal state",
        ),
        &["state"],
    )
    .expect("failed to create notification_service_stream_terminations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_stream_terminations_total");
    counter
});

static PUSHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "notification_service_pushes_total",
            "Notification frames pushed to stream connections",
        ),
        &["outcome"],
    )
    .expect("failed to create notification_service_pushes_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_pushes_total");
    counter
});

static NOTIFICATIONS_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "notification_service_notifications_persisted_total",
        "Notifications written to the store",
    )
    .expect("failed to create notification_service_notifications_persisted_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register notification_service_notifications_persisted_total");
    counter
});

/// Path label for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Route pattern for the path label, never the raw path
fn route_label(pattern: Option<String>) -> String {
    pattern.unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn stream_opened() {
    OPEN_STREAMS.inc();
}

pub fn stream_unregistered() {
    OPEN_STREAMS.dec();
}

pub fn stream_terminated(state: ConnectionState) {
    STREAM_TERMINATIONS_TOTAL
        .with_label_values(&[state.as_str()])
        .inc();
}

pub fn push_delivered() {
    PUSHES_TOTAL.with_label_values(&["delivered"]).inc();
}

pub fn push_failed() {
    PUSHES_TOTAL.with_label_values(&["failed"]).inc();
}

pub fn notification_persisted() {
    NOTIFICATIONS_PERSISTED_TOTAL.inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start.elapsed();
            match &result {
                Ok(response) => {
                    let path = route_label(response.request().match_pattern());
                    observe_http_request(&method, &path, response.status().as_u16(), elapsed);
                }
                Err(_) => {
                    observe_http_request(&method, UNMATCHED_ROUTE, 500, elapsed);
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[::core::prelude::v1::test]
    fn test_stream_metrics_are_gathered() {
        stream_opened();
        stream_terminated(ConnectionState::TimedOut);
        stream_unregistered();
        push_delivered();
        notification_persisted();

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.contains(&"notification_service_open_streams".to_string()));
        assert!(names.contains(&"notification_service_stream_terminations_total".to_string()));
        assert!(names.contains(&"notification_service_pushes_total".to_string()));
    }

    #[actix_web::test]
    async fn test_path_label_is_bounded() {
        let app = test::init_service(
            App::new()
                .wrap(MetricsMiddleware)
                .route("/items/{id}", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .default_service(web::to(|| async { HttpResponse::NotFound().finish() })),
        )
        .await;

        for uri in ["/items/7", "/items/8", "/scan/a1b2c3", "/scan/d4e5f6"] {
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        }

        let paths: Vec<String> = prometheus::gather()
            .iter()
            .filter(|family| family.get_name() == "notification_service_http_requests_total")
            .flat_map(|family| family.get_metric().to_vec())
            .flat_map(|metric| metric.get_label().to_vec())
            .filter(|label| label.get_name() == "path")
            .map(|label| label.get_value().to_string())
            .collect();

        assert!(paths.contains(&"/items/{id}".to_string()));
        assert!(paths.contains(&UNMATCHED_ROUTE.to_string()));
        assert!(!paths.iter().any(|p| p.starts_with("/scan/") || p == "/items/7"));
    }
}
