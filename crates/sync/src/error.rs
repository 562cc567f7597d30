//! Worker-level error taxonomy.
//!
//! Three failure classes surface here: business-rule vetoes
//! ([`Unpublishable`]), remote/client failures ([`crate::shopify::ShopifyError`],
//! which also covers throttle lease expiry and index I/O), and image
//! processing failures. Remote drift is not an error at all - it is healed
//! in place by the consistency layer and never reaches callers.

use thiserror::Error;

use crate::image::ImageError;
use crate::shopify::ShopifyError;

/// A business-rule veto: the item must not be published as-is.
///
/// Expected and reported per item; never aborts the rest of a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("refusing to publish item #{item_id}: {reason}")]
pub struct Unpublishable {
    /// Public identifier of the offending item.
    pub item_id: String,
    /// Human-readable reason, suitable for an operator report.
    pub reason: String,
}

impl Unpublishable {
    pub fn new(item_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            reason: reason.into(),
        }
    }
}

/// Anything that can go wrong while processing one item event.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Business-rule veto; isolated to the single item.
    #[error(transparent)]
    Unpublishable(#[from] Unpublishable),

    /// Remote API, throttle, or index failure; propagated so the caller's
    /// retry policy (the queue layer) can take over.
    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    /// Image download or decode failure.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The remote store returned a created product without its initial
    /// variant, which the product/variant model guarantees against.
    #[error("created product {product_id} came back without a variant")]
    MissingInitialVariant { product_id: i64 },
}
