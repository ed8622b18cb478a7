//! Payment webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload, so
//! it must not be parsed or re-serialized before verification.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use greencart_core::webhook::ReconcileOutcome;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /stripe`
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Stripe-Signature header".to_string()))?;

    let outcome = state.reconciler().reconcile(&body, signature).await?;

    let body = match outcome {
        ReconcileOutcome::Paid { order_id, .. } => {
            json!({"received": true, "orderId": order_id})
        }
        ReconcileOutcome::Ignored { event_type } => {
            json!({"received": true, "ignored": event_type})
        }
    };
    Ok(Json(body))
}
