//! Route table and per-request pipeline.
//!
//! Stack order, outer first: request id -> access log (with forwarded
//! client IP) -> panic recovery -> hard timeout -> CORS. Auth wraps the
//! protected router only, so `/api/health` stays public while every other
//! `/api` path, matched or not, demands a key.

use crate::auth;
use crate::handlers;
use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware;
use axum::routing::{get, patch};
use axum::Router;
use http_body_util::Full;
use std::any::Any;
use std::time::Duration;
use tacks_core::config::ServerConfig;
use tacks_core::db::repository::Repository;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Span};

/// Hard per-request deadline enforced by the pipeline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Immutable per-process state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub api_key: String,
}

impl AppState {
    pub fn new(repo: Repository, api_key: String) -> Self {
        Self { repo, api_key }
    }
}

/// Build the full application router with the middleware pipeline applied.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route(
            "/issues",
            get(handlers::list_issues).post(handlers::create_issue),
        )
        .route(
            "/issues/:id",
            get(handlers::get_issue)
                .patch(handlers::update_issue)
                .delete(handlers::delete_issue),
        )
        .route("/issues/:id/move", patch(handlers::move_issue))
        .route("/users", get(handlers::list_users))
        .route("/labels", get(handlers::list_labels))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        // Registered after the auth layer: the health probe is public.
        .route("/health", get(handlers::health));

    let pipeline = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<axum::body::Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    let client_ip =
                        client_ip(request.headers()).unwrap_or_else(|| "-".to_owned());
                    info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        %request_id,
                        %client_ip,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "request completed"
                    );
                }),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer(server));

    Router::new()
        .nest("/api", api)
        .layer(pipeline)
        .with_state(state)
}

/// Real client address from conventional forwarding headers: first
/// `X-Forwarded-For` hop, then `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return Some(first.to_owned());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-api-key")])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Full<Bytes>> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "handler panicked");

    let body = serde_json::json!({ "error": "Internal server error" }).to_string();
    let mut response = Response::new(Full::from(Bytes::from(body)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::client_ip;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(entries: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_ip(&map).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let map = headers(&[("x-real-ip", "198.51.100.4")]);
        assert_eq!(client_ip(&map).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.4"),
        ]);
        assert_eq!(client_ip(&map).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn absent_headers_yield_none() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
        let blank = headers(&[("x-forwarded-for", "  ")]);
        assert_eq!(client_ip(&blank), None);
    }
}
