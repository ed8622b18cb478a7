//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (guest carts, tower-sessions with `PostgreSQL` store)
//!
//! Identity is resolved per handler by the `RequireAuth` / `OptionalAuth`
//! extractors rather than by a layer, so the webhook route never touches it.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{IdentityResolver, OptionalAuth, RequireAuth};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
