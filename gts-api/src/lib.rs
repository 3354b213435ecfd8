use axum::{
    http::Method,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod check_in;
pub mod error;
pub mod feed;
pub mod hos;
pub mod incidents;
pub mod locations;
pub mod metrics;
pub mod middleware;
pub mod reservations;
pub mod state;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    // Everything under /v1 needs a bearer token
    let protected = Router::new()
        .merge(reservations::routes())
        .merge(check_in::routes())
        .merge(locations::routes())
        .merge(incidents::routes())
        .merge(hos::routes())
        .merge(feed::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::render))
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(state.clone(), metrics::track_requests))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
