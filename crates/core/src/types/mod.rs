//! Core types for skubridge.

pub mod entry;
pub mod item;
pub mod product_type;

pub use entry::SkuEntry;
pub use item::{CustomFields, ImageRef, Item, VariantGroup, VendorRef, present};
pub use product_type::ProductType;
