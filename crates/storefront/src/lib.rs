//! GreenCart storefront library.
//!
//! HTTP surface over `greencart-core`: `PostgreSQL` stores, the Stripe
//! Checkout client, JWT identity resolution and guest-cart sessions. Kept as
//! a library so the router can be assembled and tested without the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(session_layer)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{StorefrontConfig, StripeConfig};

    /// Router over a pool that never connects; only routes that fail before
    /// touching the database can be exercised.
    fn app() -> Router {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/greencart_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            jwt_secret: SecretString::from("j".repeat(32)),
            stripe: StripeConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
                webhook_secret: SecretString::from("whsec_Qm9vZ3JhbmQ5ODc2NTQzMjE"),
                currency: "usd".to_string(),
            },
            catalog_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/greencart_test")
            .unwrap();

        build_router(AppState::new(config, pool).unwrap())
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_order_routes_require_identity() {
        let (status, body) = send(
            Request::get("/api/order/user")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_webhook_without_signature_is_rejected() {
        let (status, body) = send(
            Request::post("/stripe")
                .body(Body::from(r#"{"type":"checkout.session.completed"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_webhook_with_forged_signature_is_rejected() {
        let (status, body) = send(
            Request::post("/stripe")
                .header("stripe-signature", "t=1700000000,v1=deadbeef")
                .body(Body::from(r#"{"type":"checkout.session.completed"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Webhook signature verification failed");
    }
}
