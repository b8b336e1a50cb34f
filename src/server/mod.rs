//! HTTP server for webhook ingestion.
//!
//! # Endpoints
//!
//! - `POST /bitbucket-scmsource-hook/notify` - Accepts Bitbucket webhook
//!   deliveries from both hosting flavors
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

pub mod health;
pub mod notify;

pub use health::health_handler;
pub use notify::notify_handler;

use crate::hooks::ProcessorRegistry;

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    processors: ProcessorRegistry,
}

impl AppState {
    /// Creates a new `AppState` over the given processor registry.
    pub fn new(processors: ProcessorRegistry) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { processors }),
        }
    }

    /// Returns the processor registry.
    pub fn processors(&self) -> &ProcessorRegistry {
        &self.inner.processors
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/bitbucket-scmsource-hook/notify", post(notify_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::test_utils::RecordingReindex;

    fn test_app() -> (axum::Router, Arc<RecordingReindex>) {
        let reindex = Arc::new(RecordingReindex::default());
        let state = AppState::new(ProcessorRegistry::standard(reindex.clone()));
        (build_router(state), reindex)
    }

    fn cloud_push_body() -> String {
        serde_json::json!({
            "push": {
                "changes": [
                    {
                        "new": {
                            "type": "branch",
                            "name": "main",
                            "target": { "hash": "2222222222222222222222222222222222222222" }
                        }
                    }
                ]
            },
            "repository": { "full_name": "team/widget" },
            "actor": { "username": "dev" }
        })
        .to_string()
    }

    fn notify_request(uri: &str, event_key: Option<&str>, body: String) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = event_key {
            builder = builder.header("x-event-key", key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let (app, _) = test_app();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    // ─── Notify endpoint tests ───

    #[tokio::test]
    async fn valid_cloud_push_triggers_reindex() {
        let (app, reindex) = test_app();

        let request = notify_request(
            "/bitbucket-scmsource-hook/notify",
            Some("repo:push"),
            cloud_push_body(),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let calls = reindex.recorded();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "team");
        assert_eq!(calls[0].1, "widget");
    }

    #[tokio::test]
    async fn server_flavor_via_query_parameter() {
        let (app, reindex) = test_app();

        let body = serde_json::json!({
            "actor": { "name": "dev" },
            "repository": { "slug": "widget", "project": { "key": "team" } },
            "changes": [
                {
                    "ref": { "displayId": "main", "type": "BRANCH" },
                    "fromHash": "1111111111111111111111111111111111111111",
                    "toHash": "2222222222222222222222222222222222222222"
                }
            ]
        })
        .to_string();

        let request = notify_request(
            "/bitbucket-scmsource-hook/notify?server_url=https://bb.example.com",
            Some("repo:refs_changed"),
            body,
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(reindex.recorded().len(), 1);
    }

    #[tokio::test]
    async fn missing_event_key_returns_400() {
        let (app, reindex) = test_app();

        let request = notify_request("/bitbucket-scmsource-hook/notify", None, cloud_push_body());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("X-Event-Key"));
        assert!(reindex.recorded().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_key_returns_400() {
        let (app, reindex) = test_app();

        let request = notify_request(
            "/bitbucket-scmsource-hook/notify",
            Some("repo:fork"),
            "{}".to_string(),
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(reindex.recorded().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_acked_without_dispatch() {
        let (app, reindex) = test_app();

        let request = notify_request(
            "/bitbucket-scmsource-hook/notify",
            Some("repo:push"),
            "not json".to_string(),
        );
        let response = app.oneshot(request).await.unwrap();

        // Acknowledged so the provider does not retry indefinitely, but the
        // dispatch collaborator must receive zero calls.
        assert_eq!(response.status(), StatusCode::OK);
        assert!(reindex.recorded().is_empty());
    }

    #[tokio::test]
    async fn cloud_pull_request_created_triggers_reindex_of_destination() {
        let (app, reindex) = test_app();

        let body = serde_json::json!({
            "pullrequest": {
                "id": 42,
                "title": "Add widgets",
                "author": { "nickname": "dev" },
                "source": {
                    "branch": { "name": "feature" },
                    "repository": { "full_name": "outsider/widget" }
                },
                "destination": {
                    "branch": { "name": "main" },
                    "repository": { "full_name": "team/widget" }
                }
            }
        })
        .to_string();

        let request = notify_request(
            "/bitbucket-scmsource-hook/notify",
            Some("pullrequest:created"),
            body,
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let calls = reindex.recorded();
        assert_eq!(calls.len(), 1);
        // Re-index targets the destination repository, not the fork.
        assert_eq!(calls[0].0, "team");
        assert_eq!(calls[0].1, "widget");
    }

    #[tokio::test]
    async fn forwarded_address_becomes_event_origin() {
        let (app, reindex) = test_app();

        let mut request = notify_request(
            "/bitbucket-scmsource-hook/notify",
            Some("repo:push"),
            cloud_push_body(),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(reindex.recorded()[0].2, "203.0.113.7");
    }
}
