// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::handlers;
use crate::state::AppState;

// =============================================================================
// ApiServer
// =============================================================================

/// The API server.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Creates the router with all routes and middleware.
    ///
    /// The timeout bounds the time to the response head only; event streams
    /// stay open after it.
    pub fn router(&self) -> Router {
        let config = &self.state.config;

        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(create_cors_layer(config));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::ready))
            .route("/api/stream", get(handlers::stream_tags))
            .route("/api/write", post(handlers::write_tag))
            .route("/api/connection/test", post(handlers::test_connection))
            .route("/api/connection/connect", post(handlers::connect))
            .route("/api/connection/disconnect", post(handlers::disconnect))
            .route("/api/tags", get(handlers::list_tags))
            .route("/api/tags/{name}", get(handlers::get_tag))
            .route("/api/status", get(handlers::station_status))
            .route("/api/status/stream", get(handlers::stream_status))
            .layer(middleware_stack)
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until `shutdown_signal` fires.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown_signal).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let router = self.router();
        let local_addr = listener.local_addr().ok();
        info!(addr = ?local_addr, "Starting API server");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {e}")))?;

        info!("API server shutdown complete");
        Ok(())
    }

    /// Returns the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.state.config.socket_addr()
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer. No configured origins means any origin.
fn create_cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL]);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use station_core::prelude::*;
    use station_opcua::SessionManager;
    use tower::ServiceExt;

    fn test_server() -> ApiServer {
        let registry = Arc::new(
            TagRegistry::new([TagDefinition::new(
                "ARU",
                "ns=1;s=ARU",
                ValueType::Boolean,
                AccessRights::READ_WRITE,
            )])
            .unwrap(),
        );
        let store = Arc::new(TagValueStore::new(registry));
        let channel = Arc::new(DistributionChannel::new(store.clone()));
        let session = SessionManager::builder(store, channel.clone()).build();
        let state = AppState::builder()
            .session(session)
            .channel(channel)
            .build()
            .unwrap();
        ApiServer::new(state)
    }

    #[test]
    fn test_default_addr() {
        assert_eq!(test_server().addr().port(), 8080);
    }

    #[tokio::test]
    async fn test_not_ready_while_disconnected() {
        let response = test_server()
            .router()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_found() {
        let response = test_server()
            .router()
            .oneshot(Request::get("/api/tags/pompe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_with_explicit_origins() {
        let config = ApiConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            ..Default::default()
        };
        let _layer = create_cors_layer(&config);
    }
}
