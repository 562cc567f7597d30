//! Remote product/variant/image model and create payloads.
//!
//! Only the fields this integration reads are modeled on the response
//! side; the store returns far more, and serde ignores the rest.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Remote product as returned by the Admin REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl Product {
    /// The variant carrying `sku`, if any.
    #[must_use]
    pub fn variant_by_sku(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|variant| variant.sku == sku)
    }

    /// The image linked to `variant_id`, if any.
    #[must_use]
    pub fn image_for_variant(&self, variant_id: i64) -> Option<&Image> {
        self.images
            .iter()
            .find(|image| image.variant_ids.contains(&variant_id))
    }
}

/// Remote variant; the SKU is the join key back to the Source item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub image_id: Option<i64>,
}

/// Remote product image with its variant links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub src: String,
    #[serde(default)]
    pub variant_ids: Vec<i64>,
}

/// Variant create payload.
#[derive(Debug, Clone, Serialize)]
pub struct VariantPayload {
    pub sku: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Decimal>,
    pub taxable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub fulfillment_service: String,
    pub inventory_management: String,
    pub inventory_policy: String,
    pub weight: u32,
    pub weight_unit: String,
    pub requires_shipping: bool,
}

/// Product create payload, carrying the initial variant.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub handle: String,
    pub vendor: String,
    pub variants: Vec<VariantPayload>,
    pub options: Vec<OptionDef>,
    /// Comma-joined tag list.
    pub tags: String,
}

/// Option definition on a product (the values live on variants).
#[derive(Debug, Clone, Serialize)]
pub struct OptionDef {
    pub name: String,
}
