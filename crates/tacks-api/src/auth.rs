//! Shared-secret API-key filter for the `/api` surface.

use crate::router::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject the request with a canned 401 unless the `X-API-Key` header
/// matches the configured secret. Downstream handlers never run on a miss.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if presented.is_empty() || !constant_time_eq(presented.as_bytes(), state.api_key.as_bytes()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Unauthorized: Invalid or missing API key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Digest both inputs, then compare the digests in constant time. Hashing
/// first means neither the content nor the length of either side leaks
/// through timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use sha2::{Digest, Sha256};
    use subtle::ConstantTimeEq;

    let hash_a = Sha256::digest(a);
    let hash_b = Sha256::digest(b);
    hash_a.ct_eq(&hash_b).into()
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn equal_inputs_match() {
        assert!(constant_time_eq(b"sekrit", b"sekrit"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn different_inputs_do_not_match() {
        assert!(!constant_time_eq(b"sekrit", b"sekret"));
        assert!(!constant_time_eq(b"sekrit", b"sekrit-but-longer"));
        assert!(!constant_time_eq(b"sekrit", b""));
    }
}
