//! Skubridge Core - Shared domain types.
//!
//! This crate provides the types shared between the sync worker and any
//! future tooling:
//! - `sync` - the item-update worker that pushes retail items to the web store
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Source item snapshots, SKU index entries, type-table rows

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
