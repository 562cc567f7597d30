//! Target store integration.
//!
//! Split in two layers. [`rest`] is the raw throttled Admin REST client:
//! one method per endpoint, no knowledge of SKUs or local state. [`manager`]
//! is the consistency layer above it: it owns the SKU index, heals drift
//! between index and store, enforces the product/variant lifecycle rules
//! and deduplicates images by content hash.

pub mod manager;
pub mod rest;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::image::ImageError;
use crate::index::IndexError;
use crate::throttle::ThrottleError;

pub use manager::{ProductManager, RemoteState};
pub use rest::{ProductApi, RestProductApi};

/// Failures from the Target store integration.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Transport-level failure talking to the Admin API.
    #[error("shopify request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The Admin API answered with a non-success status.
    #[error("shopify api returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// More than one product carries a handle that must be unique.
    #[error("multiple products share handle {handle}")]
    DuplicateHandle { handle: String },

    /// The variant an operation targets does not exist on its product.
    #[error("product {product_id} has no variant with sku {sku}")]
    VariantNotFound { product_id: i64, sku: String },

    /// No API call was admitted within the rate-limit lease.
    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    /// SKU index read or write failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Image download or decode failure while reconciling product images.
    #[error(transparent)]
    Image(#[from] ImageError),
}
