//! SKU index entry.

use serde::{Deserialize, Serialize};

/// The durable link between a Source item and its remote counterpart.
///
/// An entry exists if and only if the sync worker created or updated a
/// remote variant with that SKU and has not since observed its deletion.
/// The web store has no Source-identifier field to query server-side, so
/// this mapping is the only way back from a SKU to remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuEntry {
    /// Remote product id.
    pub product_id: i64,
    /// Remote variant id within that product.
    pub variant_id: i64,
}

impl SkuEntry {
    /// Create a new entry.
    #[must_use]
    pub const fn new(product_id: i64, variant_id: i64) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }
}
