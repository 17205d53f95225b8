//! HTTP façade.
//!
//! Stateless routes that read the registry without changing it:
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /initialize-socket/{key}` | 200 if the key is free, 400 if taken |
//! | `GET /pair/{key}` | JSON [`PairStatus`] |
//! | anything else | file from the static directory, if configured |

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tower_http::services::ServeDir;
use tracing::debug;

use crate::session::{Hub, PairStatus};

// ============================================================================
// Router
// ============================================================================

/// Builds the façade router.
///
/// `static_dir` is served as a fallback, with `index.html` for `/`.
pub fn router(hub: Arc<Hub>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/initialize-socket/{key}", get(initialize_socket))
        .route("/pair/{key}", get(pair_status))
        .with_state(hub);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Reports whether a WebSocket may still be opened under `key`.
async fn initialize_socket(
    State(hub): State<Arc<Hub>>,
    UrlPath(key): UrlPath<String>,
) -> (StatusCode, String) {
    if hub.registry().contains(&key) {
        debug!(key = %key, "Key probe: taken");
        return (
            StatusCode::BAD_REQUEST,
            "WebSocket for this key is already initialized.".to_string(),
        );
    }

    debug!(key = %key, "Key probe: free");
    (
        StatusCode::OK,
        format!("WebSocket path initialized for key: {key}"),
    )
}

/// Describes `key`, its counterpart and whether the pair is active.
async fn pair_status(
    State(hub): State<Arc<Hub>>,
    UrlPath(key): UrlPath<String>,
) -> Json<PairStatus> {
    Json(hub.status(&key))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::identifiers::EndpointKey;

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_socket_free_key() {
        let hub = Arc::new(Hub::default());
        let (status, body) = get_body(router(hub, None), "/initialize-socket/abc").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "WebSocket path initialized for key: abc");
    }

    #[tokio::test]
    async fn test_initialize_socket_taken_key() {
        let hub = Arc::new(Hub::default());
        let (_agent, _rx) = hub.admit(EndpointKey::from("abc")).unwrap();

        let (status, body) = get_body(router(Arc::clone(&hub), None), "/initialize-socket/abc").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "WebSocket for this key is already initialized.");
        // Probe never mutates the registry.
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_pair_status() {
        let hub = Arc::new(Hub::default());
        let (_agent, _agent_rx) = hub.admit(EndpointKey::from("abc")).unwrap();

        let (status, body) = get_body(router(Arc::clone(&hub), None), "/pair/abc").await;
        assert_eq!(status, StatusCode::OK);

        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "key": "abc",
                "role": "agent",
                "counterpart": "abcbrowser",
                "registered": true,
                "counterpartRegistered": false,
                "active": false,
            })
        );
    }

    #[tokio::test]
    async fn test_static_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>relay</h1>").unwrap();

        let hub = Arc::new(Hub::default());
        let (status, body) = get_body(router(hub, Some(dir.path())), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>relay</h1>");
    }

    #[tokio::test]
    async fn test_no_static_dir_is_not_found() {
        let hub = Arc::new(Hub::default());
        let (status, _) = get_body(router(hub, None), "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
