//! Type-lookup table row.

use serde::{Deserialize, Serialize};

/// One row of the merchandising type table.
///
/// Maps an item sub-class to its display name (used for the `Type_<name>`
/// storefront tag) and the default shipping level applied when an item
/// carries no inline override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductType {
    /// Sub-class key as entered on the retail platform.
    pub sub_class: String,
    /// Customer-facing type name.
    pub name: String,
    /// Default shipping level for items of this type.
    pub shipping_level: i32,
}
