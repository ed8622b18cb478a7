//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error bodies use the same envelope as successful API responses:
//! `{"success": false, "message": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use greencart_core::address::AddressError;
use greencart_core::{CartError, OrderError, StorageError, WebhookError};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A core store operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Order creation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Webhook processing failed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Cart session operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Submitted address is invalid.
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                OrderError::Catalog(_) | OrderError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                OrderError::Gateway(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Webhook(err) => match err {
                WebhookError::Signature(_) | WebhookError::MalformedEvent(_) => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::AlreadyAuthenticated => StatusCode::CONFLICT,
                CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                CartError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Address(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Order(OrderError::Validation(msg)) => msg.clone(),
            Self::Order(err @ OrderError::ProductNotFound(_)) => err.to_string(),
            Self::Order(OrderError::Gateway(_)) => "Payment service error".to_string(),
            Self::Webhook(WebhookError::Signature(_)) => {
                "Webhook signature verification failed".to_string()
            }
            Self::Webhook(WebhookError::MalformedEvent(_)) => "Malformed webhook event".to_string(),
            Self::Cart(CartError::AlreadyAuthenticated) => "Cart already merged".to_string(),
            Self::Cart(err @ CartError::InvalidQuantity(_)) => err.to_string(),
            Self::Address(err) => err.to_string(),
            Self::NotFound(_) | Self::Unauthorized(_) | Self::BadRequest(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "success": false,
            "message": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
