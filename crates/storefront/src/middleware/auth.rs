//! Identity resolution and authentication extractors.
//!
//! Login and registration live outside this service. Clients present the
//! identity token they were issued, either as the `token` cookie or as an
//! `Authorization: Bearer` header. The token is an HS256 JWT whose `id`
//! claim is the user ID; nothing beyond the signature and expiry is checked.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use greencart_core::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::cookie::Cookie;
use tracing::debug;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Name of the identity cookie.
pub const TOKEN_COOKIE_NAME: &str = "token";

#[derive(Debug, Deserialize)]
struct Claims {
    /// Issued as either a number or a numeric string.
    id: Value,
}

/// Resolves a user ID from an identity token.
#[derive(Clone)]
pub struct IdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// The user a token belongs to, or `None` if it is invalid or expired.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        let claims = match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Rejected identity token");
                return None;
            }
        };

        match claims.id {
            Value::Number(n) => n.as_i64().and_then(|id| i32::try_from(id).ok()).map(UserId::new),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Resolve the identity carried by a request, if any.
    #[must_use]
    pub fn resolve_parts(&self, parts: &Parts) -> Option<UserId> {
        token_from_parts(parts).and_then(|token| self.resolve(&token))
    }
}

/// Bearer token first, then the `token` cookie.
fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == TOKEN_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Extractor that requires an authenticated user.
///
/// Rejects with 401 and the usual `{"success": false}` envelope.
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = state
            .identity()
            .resolve_parts(parts)
            .ok_or_else(|| AppError::Unauthorized("Not Authorized. Login Again".to_string()))?;

        set_sentry_user(&id);
        Ok(Self(CurrentUser { id }))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject guests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = state.identity().resolve_parts(parts).map(|id| {
            set_sentry_user(&id);
            CurrentUser { id }
        });
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "k8Jd!2mQz#9vLp$4rTx&7wNc";

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(&SecretString::from(SECRET))
    }

    fn token(id: &Value, secret: &str, ttl_secs: i64) -> String {
        let claims = json!({"id": id, "exp": Utc::now().timestamp() + ttl_secs});
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn parts(header: (&str, String)) -> Parts {
        Request::builder()
            .uri("/api/cart")
            .header(header.0, header.1)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_resolves_numeric_and_string_ids() {
        let r = resolver();
        assert_eq!(r.resolve(&token(&json!(42), SECRET, 600)), Some(UserId::new(42)));
        assert_eq!(r.resolve(&token(&json!("17"), SECRET, 600)), Some(UserId::new(17)));
        assert_eq!(r.resolve(&token(&json!("abc"), SECRET, 600)), None);
    }

    #[test]
    fn test_rejects_wrong_key_and_expired_tokens() {
        let r = resolver();
        assert_eq!(r.resolve(&token(&json!(1), "another-key-Zq81!x", 600)), None);
        assert_eq!(r.resolve(&token(&json!(1), SECRET, -3600)), None);
        assert_eq!(r.resolve("not-a-jwt"), None);
    }

    #[test]
    fn test_token_from_cookie() {
        let jwt = token(&json!(5), SECRET, 600);
        let parts = parts(("cookie", format!("theme=dark; token={jwt}; other=1")));
        assert_eq!(resolver().resolve_parts(&parts), Some(UserId::new(5)));
    }

    #[test]
    fn test_token_from_bearer_header() {
        let jwt = token(&json!(9), SECRET, 600);
        let parts = parts(("authorization", format!("Bearer {jwt}")));
        assert_eq!(resolver().resolve_parts(&parts), Some(UserId::new(9)));
    }

    #[test]
    fn test_missing_token() {
        let parts = parts(("cookie", "theme=dark".to_string()));
        assert_eq!(resolver().resolve_parts(&parts), None);
    }
}
