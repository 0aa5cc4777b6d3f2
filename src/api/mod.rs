// API module - HTTP endpoints

pub mod health;
pub mod middleware;
pub mod senatran;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use middleware::state::AppState;

/// Full application router with shared layers applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(senatran::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener; `host` may be an address or a resolvable name.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn health_reports_store_status() {
        let state = AppState::new(Config::with_app_key("k"), Arc::new(MemoryStore::new())).unwrap();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = app(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["dependencies"]["store"]["status"], "healthy");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let state = AppState::new(Config::with_app_key("k"), Arc::new(MemoryStore::new())).unwrap();
        let req = Request::builder()
            .uri("/v2/senatran/nada")
            .body(Body::empty())
            .unwrap();

        let resp = app(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_accepts_host_names() {
        let listener = bind("localhost", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());

        let listener = bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
