//! Item → product/variant translation.
//!
//! Pure functions: the only inputs are the item snapshot and the loaded
//! type table. Translation fails with [`Unpublishable`] for the two
//! business-rule vetoes (shipping level −1 and MAP pricing violations);
//! everything else degrades with a warning rather than blocking the item.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::warn;

use skubridge_core::{CustomFields, Item, present};

use crate::error::Unpublishable;
use crate::html;
use crate::shopify::types::{OptionDef, ProductPayload, VariantPayload};
use crate::types_table::TypeTable;

/// Namespace tag stamped on every synced product; also the first handle
/// component, so regenerating the grouping scheme reshuffles handles
/// without colliding with an earlier generation's products.
pub const NAMESPACE_TAG: &str = "skubridge1";

/// Fulfillment service name registered for the retail platform.
const FULFILLMENT_SERVICE: &str = "retail-pos";

/// Applied when neither an inline override nor a type default exists.
const EMERGENCY_SHIPPING_LEVEL: i32 = 1;

/// Level meaning in-store pickup only: zero weight, not shippable online.
const IN_STORE_PICKUP_LEVEL: i32 = -2;

/// One product option in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductOption {
    pub name: String,
    pub value: String,
}

/// Deterministic grouping key: items hashing to the same handle become
/// variants of one product.
///
/// Components: the namespace tag, gender, brand (falling back to the
/// vendor id), a *presence* indicator for the color/size attributes, and
/// the grid description (or the item's own when it has no grid). The
/// indicator is deliberately insensitive to attribute values: two items
/// with different colors still group together, which is exactly what
/// makes them variants. A hash collision across unrelated families is an
/// accepted risk.
#[must_use]
pub fn handle(item: &Item) -> String {
    let gender = present(item.custom.gender.as_ref()).unwrap_or("");
    let brand = present(item.custom.brand.as_ref()).map_or_else(
        || {
            item.primary_vendor_id
                .map(|id| id.to_string())
                .unwrap_or_default()
        },
        str::to_string,
    );
    // All variants of a product must share the same option set.
    let option_signature = format!(
        "{}{}",
        if item.custom.color().is_some() { "color" } else { "" },
        if item.custom.size().is_some() { "size" } else { "" },
    );
    let description = item
        .grid
        .as_ref()
        .map_or(item.description.as_str(), |grid| grid.description.as_str());

    let joined = [NAMESPACE_TAG, gender, &brand, &option_signature, description].join(",");
    hex::encode(Sha256::digest(joined.as_bytes()))
}

/// Recognized option attributes in fixed display order. Order is load
/// bearing: variant option values are positional (option1..option3).
#[must_use]
pub fn options(custom: &CustomFields) -> Vec<ProductOption> {
    let recognized = [
        ("size", custom.size()),
        ("color", custom.color()),
        // "length" reads poorly on a storefront.
        ("2nd Dimension", custom.length()),
    ];

    recognized
        .into_iter()
        .filter_map(|(name, value)| {
            value.map(|value| ProductOption {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Translate an item into a variant create payload.
///
/// # Errors
///
/// [`Unpublishable`] when the shipping level resolves to exactly −1 or
/// MAP pricing rules veto the item.
pub fn variant_payload(item: &Item, types: &TypeTable) -> Result<VariantPayload, Unpublishable> {
    let level = resolve_shipping_level(item, types)?;
    let price = resolve_price(item)?;

    let mut option_values = options(&item.custom).into_iter().map(|option| option.value);

    Ok(VariantPayload {
        sku: item.public_id.clone(),
        price,
        compare_at_price: item.original_price,
        taxable: present(item.custom.tax_category.as_ref()) == Some("Taxable"),
        option1: option_values.next(),
        option2: option_values.next(),
        option3: option_values.next(),
        barcode: present(item.custom.upc_gtin.as_ref()).map(str::to_string),
        fulfillment_service: FULFILLMENT_SERVICE.to_string(),
        inventory_management: "shopify".to_string(),
        inventory_policy: if present(item.custom.oosp_policy.as_ref()) == Some("Allow") {
            // The storefront sells through zero inventory for these items.
            "continue".to_string()
        } else {
            "deny".to_string()
        },
        // The store rejects negative weights; every negative level means
        // "no shipping charge applies".
        weight: u32::try_from(level.max(0)).unwrap_or(0),
        weight_unit: "kg".to_string(),
        requires_shipping: level > -1,
    })
}

/// Translate an item into a product create payload with its initial
/// variant.
///
/// # Errors
///
/// Same vetoes as [`variant_payload`].
pub fn product_payload(item: &Item, types: &TypeTable) -> Result<ProductPayload, Unpublishable> {
    let variant = variant_payload(item, types)?;

    let title = item
        .grid
        .as_ref()
        .map_or(item.description.as_str(), |grid| grid.description.as_str())
        .to_string();

    Ok(ProductPayload {
        product_type: present(item.custom.sub_class.as_ref()).map(str::to_string),
        title,
        body_html: item.long_description.as_deref().map(html::strip_styling),
        handle: handle(item),
        vendor: item
            .primary_vendor
            .as_ref()
            .map(|vendor| vendor.name.clone())
            .unwrap_or_default(),
        options: options(&item.custom)
            .into_iter()
            .map(|option| OptionDef { name: option.name })
            .collect(),
        variants: vec![variant],
        tags: tags(item, types).join(","),
    })
}

/// Storefront tag list: namespace tag, type tag, gender tag(s), brand tag.
fn tags(item: &Item, types: &TypeTable) -> Vec<String> {
    let mut tags = vec![NAMESPACE_TAG.to_string()];

    // Type tag, used by the storefront to sort by merchandising type.
    match present(item.custom.sub_class.as_ref()).and_then(|sub_class| types.lookup(sub_class)) {
        Some(product_type) => tags.push(format!("Type_{}", product_type.name)),
        None => {
            warn!(
                item = %item.public_id,
                sub_class = ?item.custom.sub_class,
                "no type mapping for sub-class, omitting type tag; add a row to the type table"
            );
        }
    }

    if let Some(gender) = present(item.custom.gender.as_ref()) {
        match gender {
            "Unisex" => {
                tags.push("Gender_Mens".to_string());
                tags.push("Gender_Womens".to_string());
            }
            "Kids" => {
                tags.push("Gender_Boys".to_string());
                tags.push("Gender_Girls".to_string());
            }
            other => {
                tags.push(format!("Gender_{other}"));
                tags.push(format!("GenderPrefix: {other}"));
            }
        }
    }

    let brand = present(item.custom.brand.as_ref()).map_or_else(
        || {
            item.primary_vendor
                .as_ref()
                .map(|vendor| vendor.name.clone())
        },
        |brand| Some(brand.to_string()),
    );
    if let Some(brand) = brand {
        tags.push(format!("Brand_{brand}"));
    }

    tags
}

/// Resolve the shipping level: inline override (when it parses as an
/// integer), then the type-table default, then the emergency fallback.
fn resolve_shipping_level(item: &Item, types: &TypeTable) -> Result<i32, Unpublishable> {
    let default = present(item.custom.sub_class.as_ref())
        .and_then(|sub_class| types.lookup(sub_class))
        .map(|product_type| product_type.shipping_level);
    if default.is_none() {
        warn!(
            item = %item.public_id,
            sub_class = ?item.custom.sub_class,
            "no default shipping level for sub-class; add a row to the type table"
        );
    }

    let mut level = default;
    if let Some(raw) = present(item.custom.shipping_level.as_ref()) {
        // Custom fields are free text; an operator can type anything here.
        match raw.trim().parse::<i32>() {
            Ok(inline) => level = Some(inline),
            Err(_) => {
                warn!(
                    item = %item.public_id,
                    raw,
                    fallback = ?level,
                    "ignoring non-numeric inline shipping level"
                );
            }
        }
    }

    let mut level = level.unwrap_or_else(|| {
        warn!(
            item = %item.public_id,
            "no default or inline shipping level; using emergency fallback of {EMERGENCY_SHIPPING_LEVEL}. \
             Set a level soon or customers may be undercharged for shipping"
        );
        EMERGENCY_SHIPPING_LEVEL
    });

    if level == -1 {
        return Err(Unpublishable::new(
            &item.public_id,
            "shipping level is set to -1",
        ));
    }
    if level < IN_STORE_PICKUP_LEVEL {
        warn!(
            item = %item.public_id,
            level,
            "illegal shipping level, clamping to {IN_STORE_PICKUP_LEVEL} (in-store pickup only)"
        );
        level = IN_STORE_PICKUP_LEVEL;
    }

    Ok(level)
}

/// Resolve the published price under MAP (minimum advertised price) rules.
fn resolve_price(item: &Item) -> Result<Decimal, Unpublishable> {
    let map_enforced = present(item.custom.map.as_ref()) != Some("Not Enforced");
    let web_price = parse_price(item.custom.web_price.as_ref());

    if !map_enforced {
        return Ok(web_price.unwrap_or(item.price));
    }

    // An unset MAP field falls back to the original price as the floor.
    let threshold = parse_price(item.custom.minimum_advertised_price.as_ref())
        .or(item.original_price)
        .filter(|threshold| !threshold.is_zero());
    let Some(threshold) = threshold else {
        return Err(Unpublishable::new(
            &item.public_id,
            "MAP is enforced but no MAP threshold is defined",
        ));
    };

    match web_price {
        Some(web) if web < threshold => Err(Unpublishable::new(
            &item.public_id,
            "web price is set below the MAP threshold",
        )),
        Some(web) => Ok(web),
        None => Ok(item.price.max(threshold)),
    }
}

fn parse_price(field: Option<&String>) -> Option<Decimal> {
    present(field).and_then(|raw| raw.trim().parse::<Decimal>().ok())
}
