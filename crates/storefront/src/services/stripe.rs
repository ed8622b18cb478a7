//! Stripe Checkout client.
//!
//! Creates hosted checkout sessions through the form-encoded REST API. Calls
//! are not retried; a failure is reported to the caller as a `GatewayError`.

use greencart_core::GatewayError;
use greencart_core::payment::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::config::StripeConfig;

/// Stripe API version pinned for request and webhook payload shapes.
const API_VERSION: &str = "2024-06-20";

/// Stripe Checkout API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);
        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            currency: config.currency.clone(),
        })
    }
}

/// Flatten a checkout request into Stripe's bracketed form fields.
fn checkout_form(request: &CheckoutSessionRequest, currency: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            request.redirects.success_url.clone(),
        ),
        ("cancel_url".to_string(), request.redirects.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    for (key, value) in request.metadata.to_pairs() {
        form.push((format!("metadata[{key}]"), value));
    }

    form
}

impl PaymentGateway for StripeClient {
    #[instrument(
        skip(self, request),
        fields(order_id = %request.metadata.order_id, items = request.line_items.len())
    )]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let form = checkout_form(request, &self.currency);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Stripe rejected checkout session");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| GatewayError::Response(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use greencart_core::payment::{CheckoutLineItem, CheckoutMetadata, CheckoutRedirects};
    use greencart_core::{OrderId, UserId};

    use super::*;

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_fields() {
        let request = CheckoutSessionRequest {
            line_items: vec![
                CheckoutLineItem {
                    name: "Apples".to_string(),
                    unit_amount: 1018,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Milk".to_string(),
                    unit_amount: 306,
                    quantity: 1,
                },
            ],
            redirects: CheckoutRedirects::for_origin("https://shop.test"),
            metadata: CheckoutMetadata {
                order_id: OrderId::new(12),
                user_id: UserId::new(7),
            },
        };

        let form = checkout_form(&request, "usd");

        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "success_url"), Some("https://shop.test/my-orders"));
        assert_eq!(field(&form, "cancel_url"), Some("https://shop.test/cart"));
        assert_eq!(field(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            field(&form, "line_items[0][price_data][product_data][name]"),
            Some("Apples")
        );
        assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("1018"));
        assert_eq!(field(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(field(&form, "line_items[1][price_data][unit_amount]"), Some("306"));
        assert_eq!(field(&form, "metadata[orderId]"), Some("12"));
        assert_eq!(field(&form, "metadata[userId]"), Some("7"));
    }
}
