pub mod catalog;
pub mod migrate;

use secrecy::SecretString;

/// Storefront database URL, falling back to the generic `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
