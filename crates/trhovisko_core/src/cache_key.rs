//! crates/trhovisko_core/src/cache_key.rs
//!
//! Deterministic cache key derivation for the product comparison feature.
//! The key is a pure function of the normalized input: product identities
//! are lowercased, trimmed and sorted before hashing, so logically identical
//! requests in a different literal order map to the same entry.

use crate::domain::ProductInfo;
use sha2::{Digest, Sha256};

/// Derives the comparison cache key for a set of products in one category.
pub fn comparison_key(products: &[ProductInfo], category: &str) -> String {
    let mut identities: Vec<String> = products.iter().map(product_identity).collect();
    identities.sort();

    let mut hasher = Sha256::new();
    hasher.update(category.trim().to_lowercase().as_bytes());
    for identity in &identities {
        hasher.update(b"|");
        hasher.update(identity.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// One product's contribution to the key: name and brand, normalized.
/// Prices and locations are deliberately excluded so a seller tweaking the
/// asking price does not fragment the cache.
fn product_identity(product: &ProductInfo) -> String {
    let brand = product
        .brand
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    format!("{}#{}", product.name.trim().to_lowercase(), brand)
}
