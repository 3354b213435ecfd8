use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{opts, IntCounter, IntCounterVec, Registry, TextEncoder};

use crate::state::AppState;

/// Prometheus counters exposed at `/metrics`.
pub struct ApiMetrics {
    registry: Registry,
    pub http_requests: IntCounterVec,
    pub feed_events: IntCounterVec,
    pub rate_limited: IntCounter,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            opts!("gts_http_requests_total", "HTTP requests by route, method and status"),
            &["route", "method", "status"],
        )?;
        let feed_events = IntCounterVec::new(
            opts!("gts_feed_events_total", "Events published to the ops feed"),
            &["kind"],
        )?;
        let rate_limited = IntCounter::new("gts_rate_limited_total", "Requests rejected by the rate limiter")?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(feed_events.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            feed_events,
            rate_limited,
        })
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    state
        .metrics
        .http_requests
        .with_label_values(&[route.as_str(), method.as_str(), response.status().as_str()])
        .inc();
    response
}

pub async fn render(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
