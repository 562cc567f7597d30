//! Skubridge sync worker.
//!
//! Translates item-update events from the retail platform ("the Source")
//! into product/variant/image operations against the web store ("the
//! Target"), keeping a durable SKU index consistent with remote state and
//! throttling every outbound call against the store's shared API quota.
//!
//! # Architecture
//!
//! - [`translate`] - pure item → product/variant payload translation
//! - [`shopify`] - throttled REST client plus the SKU-aware consistency
//!   layer that reconciles local index state with remote drift
//! - [`throttle`] - distributed token bucket shared by all worker
//!   processes through Redis
//! - [`index`] - durable SKU → remote-identifier mapping (Postgres)
//! - [`pipeline`] - the per-item delete-stale / apply-fresh flow
//!
//! The worker itself owns no queue or webhook semantics: it is handed item
//! events by an external batching layer and reports success or failure per
//! item. Events are at-least-once; every operation here tolerates
//! re-processing.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod html;
pub mod image;
pub mod index;
pub mod pipeline;
pub mod shopify;
pub mod throttle;
pub mod translate;
pub mod types_table;

pub use config::Config;
pub use error::SyncError;
