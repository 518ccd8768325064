//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handlers::search))
        .route("/libraries", get(handlers::libraries))
        .route("/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Backend, BackendRegistry, SearchOptions};
    use crate::config::Settings;
    use crate::metrics::Metrics;
    use crate::results::Record;
    use anyhow::bail;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use scraper::ElementRef;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Shelf(&'static str);

    #[async_trait]
    impl Backend for Shelf {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(&self, term: &str, options: &SearchOptions) -> anyhow::Result<Vec<Record>> {
            if self.0 == "broken" {
                bail!("catalog offline");
            }
            let mut record = Record::new("").with_title(format!("{} ({})", term, self.0));
            record.location = options
                .get("branch")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok(vec![record])
        }

        fn extract_metadata(&self, _node: ElementRef<'_>) -> Option<Record> {
            None
        }
    }

    fn app() -> Router {
        let mut registry = BackendRegistry::new();
        registry.register_instance(Arc::new(Shelf("stadtbibliothek")), None);
        registry.register_instance(Arc::new(Shelf("broken")), None);
        let state = AppState::new(Settings::default(), Arc::new(registry), Arc::new(Metrics::new()));
        create_router(state)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn post_search(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let (status, body) = call(
            app(),
            post_search(json!({
                "query": "Orwell",
                "libraries": ["stadtbibliothek", "broken", "ghost"],
                "filters": {"branch": "Zentrale"}
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["results"][0]["title"], "Orwell (stadtbibliothek)");
        assert_eq!(body["results"][0]["library"], "stadtbibliothek");
        assert_eq!(body["results"][0]["location"], "Zentrale");
        assert_eq!(
            body["errors"],
            json!([
                "backend 'ghost' not supported",
                "error in 'broken': catalog offline"
            ])
        );
    }

    #[tokio::test]
    async fn test_search_without_errors_has_null_errors() {
        let (status, body) = call(
            app(),
            post_search(json!({"term": "Orwell", "backend_ids": []})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": [], "total_count": 0, "errors": null}));
    }

    #[tokio::test]
    async fn test_empty_term_is_rejected() {
        let (status, body) = call(
            app(),
            post_search(json!({"term": "   ", "backend_ids": ["stadtbibliothek"]})),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "search term must not be empty");
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (status, body) = call(app(), post_search(json!({"backend_ids": "nope"}))).await;

        assert!(status.is_client_error());
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_libraries_in_registration_order() {
        let (status, body) = call(app(), get("/libraries")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"libraries": ["stadtbibliothek", "broken"]}));
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (status, body) = call(app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let app = app();
        call(app.clone(), post_search(json!({"term": "x", "backend_ids": ["broken"]}))).await;
        let (_, body) = call(app, get("/stats")).await;
        assert_eq!(body["backend_count"], 2);
        assert_eq!(body["metrics"]["total_searches"], 1);
        assert_eq!(body["metrics"]["backends"]["broken"]["failures"], 1);
    }
}
