//! Source item snapshot as delivered by item-update events.
//!
//! An [`Item`] is an immutable snapshot of one stock-keeping unit on the
//! retail platform at the moment the event fired. Events are delivered
//! at-least-once, so consumers must tolerate re-processing the same
//! snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One retail item as carried by an item-update event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Public identifier; doubles as the SKU on the web store.
    pub public_id: String,
    /// Whether the item should be published at all.
    #[serde(rename = "active?")]
    pub active: bool,
    /// Base retail price.
    pub price: Decimal,
    /// Original (pre-markdown) price, shown as compare-at on the store.
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Short description; product title when the item has no grid.
    #[serde(default)]
    pub description: String,
    /// Long-form HTML description.
    #[serde(default)]
    pub long_description: Option<String>,
    /// Primary vendor id, used as a brand fallback when grouping.
    #[serde(default)]
    pub primary_vendor_id: Option<i64>,
    /// Expanded primary vendor record, if the feed included it.
    #[serde(default)]
    pub primary_vendor: Option<VendorRef>,
    /// Primary image reference, if any.
    #[serde(default)]
    pub primary_image: Option<ImageRef>,
    /// Grid (variant group) this item belongs to, if any.
    #[serde(default)]
    pub grid: Option<VariantGroup>,
    /// Free-form custom attributes, narrowed to the recognized keys.
    #[serde(default)]
    pub custom: CustomFields,
}

/// Expanded vendor reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRef {
    pub name: String,
}

/// Remote image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

/// Variant group ("grid") shared by sibling items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantGroup {
    pub description: String,
}

/// The custom attributes this integration recognizes.
///
/// The Source platform stores these as untyped free-text fields; every
/// field is optional and may hold garbage, so values that must be numeric
/// are kept as strings here and validated at translation time. An empty
/// string is treated the same as an absent field throughout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFields {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Second dimension (e.g. ski length); displayed as "2nd Dimension".
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Brand override; the vendor name is used when absent.
    #[serde(default)]
    pub brand: Option<String>,
    /// Sub-class key into the type-lookup table.
    #[serde(default)]
    pub sub_class: Option<String>,
    /// "Taxable" marks the item as taxable online.
    #[serde(default)]
    pub tax_category: Option<String>,
    /// Inline shipping-level override, free text.
    #[serde(default)]
    pub shipping_level: Option<String>,
    /// MAP enforcement flag; "Not Enforced" disables the floor.
    #[serde(default)]
    pub map: Option<String>,
    /// MAP floor price. The field name is misspelled in the Source schema.
    #[serde(default, rename = "minimum_advertrised_price")]
    pub minimum_advertised_price: Option<String>,
    /// Explicit web price override.
    #[serde(default)]
    pub web_price: Option<String>,
    /// Barcode.
    #[serde(default)]
    pub upc_gtin: Option<String>,
    /// Online out-of-stock purchase policy; "Allow" keeps the item
    /// purchasable with zero inventory.
    #[serde(default)]
    pub oosp_policy: Option<String>,
}

/// Treat empty strings as absent, matching how the Source platform
/// round-trips cleared custom fields.
#[must_use]
pub fn present(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|s| !s.trim().is_empty())
}

impl CustomFields {
    /// Size attribute, if set to a non-empty value.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        present(self.size.as_ref())
    }

    /// Color attribute, if set to a non-empty value.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        present(self.color.as_ref())
    }

    /// Length attribute, if set to a non-empty value.
    #[must_use]
    pub fn length(&self) -> Option<&str> {
        present(self.length.as_ref())
    }
}
