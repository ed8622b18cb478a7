//! Catalog import.
//!
//! The file holds a `products` list. Each entry is upserted by ID, so running
//! the same import twice leaves the catalog unchanged.
//!
//! ```yaml
//! products:
//!   - id: p1
//!     name: Organic Apples
//!     category: Fruits
//!     price: '4.50'
//!     offerPrice: '3.99'
//! ```

use std::collections::HashSet;
use std::path::Path;

use greencart_core::ProductId;
use greencart_storefront::db::{self, CatalogEntry, PgCatalog};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<CatalogEntry>,
}

/// Check entries for problems the database would reject or silently accept.
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&ProductId> = HashSet::new();

    for entry in &file.products {
        if !seen.insert(&entry.id) {
            errors.push(format!("{}: duplicate product id", entry.id));
        }
        if entry.name.trim().is_empty() {
            errors.push(format!("{}: name is empty", entry.id));
        }
        if entry.price < Decimal::ZERO || entry.offer_price < Decimal::ZERO {
            errors.push(format!("{}: prices must not be negative", entry.id));
        }
    }

    errors
}

/// Import products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database write fails.
pub async fn import(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    info!(products = file.products.len(), "Parsed catalog");

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let database_url = super::database_url()
        .ok_or("STOREFRONT_DATABASE_URL or DATABASE_URL not set")?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let catalog = PgCatalog::new(pool);
    for entry in &file.products {
        catalog.upsert(entry).await?;
    }

    info!(products = file.products.len(), "Catalog import complete");
    Ok(())
}
