//! Per-item event flow.
//!
//! Every item-update event is handled the same way regardless of what
//! changed: any existing remote variant for the SKU is deleted first, then
//! the fresh state is published if the item is still active. Delete-then-
//! recreate costs an extra API call over an in-place update but makes
//! re-processing trivially idempotent, which at-least-once delivery
//! requires.

use tracing::{info, instrument, warn};

use skubridge_core::Item;

use crate::error::{SyncError, Unpublishable};
use crate::image::NormalizedImage;
use crate::index::SkuIndex;
use crate::shopify::rest::ProductApi;
use crate::shopify::ProductManager;
use crate::translate;
use crate::types_table::TypeTable;

/// How one item event ended.
#[derive(Debug)]
pub enum Outcome {
    /// The item's fresh state is live on the store.
    Published,
    /// The item is inactive; any remote presence was removed.
    Retired,
    /// A business rule vetoed publication; stale remote state was still
    /// removed, so nothing outdated stays visible.
    Vetoed(Unpublishable),
}

/// Tally for one batch of item events.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub published: usize,
    pub retired: usize,
    pub vetoed: Vec<Unpublishable>,
}

/// Process one item event end to end.
///
/// # Errors
///
/// Remote, throttle, index, or image failures. Business-rule vetoes are
/// *not* errors; they come back as [`Outcome::Vetoed`].
#[instrument(skip_all, fields(item = %item.public_id, active = item.active))]
pub async fn process_item<A: ProductApi, I: SkuIndex>(
    manager: &ProductManager<A, I>,
    types: &TypeTable,
    item: &Item,
) -> Result<Outcome, SyncError> {
    // Delete-stale: whatever the store holds for this SKU predates the
    // event and must go.
    if let Some(product) = manager.find_product_by_sku(&item.public_id).await? {
        manager.delete_variant(&item.public_id, &product).await?;
    }

    if !item.active {
        info!("item inactive, retired from the store");
        return Ok(Outcome::Retired);
    }

    match publish(manager, types, item).await {
        Ok(()) => Ok(Outcome::Published),
        Err(SyncError::Unpublishable(veto)) => {
            warn!(reason = %veto.reason, "item vetoed");
            Ok(Outcome::Vetoed(veto))
        }
        Err(error) => Err(error),
    }
}

/// Publish the item's fresh state: join an existing product by handle or
/// create a new one, then attach the primary image.
async fn publish<A: ProductApi, I: SkuIndex>(
    manager: &ProductManager<A, I>,
    types: &TypeTable,
    item: &Item,
) -> Result<(), SyncError> {
    let variant = translate::variant_payload(item, types)?;
    let handle = translate::handle(item);

    let (product, variant_id) = match manager.find_product_by_handle(&handle).await? {
        Some(existing) => {
            let created = manager.create_variant(existing.id, &variant).await?;
            (existing, created.id)
        }
        None => {
            let payload = translate::product_payload(item, types)?;
            let created = manager.create_product(&item.public_id, &payload).await?;
            let variant_id = created
                .variants
                .first()
                .map(|v| v.id)
                .ok_or(SyncError::MissingInitialVariant {
                    product_id: created.id,
                })?;
            (created, variant_id)
        }
    };

    if let Some(image_ref) = &item.primary_image {
        let bytes = manager.download_image(&image_ref.url).await?;
        let image = NormalizedImage::decode(&bytes)?.squared();
        manager.attach_image(&product, variant_id, &image).await?;
    }

    info!(product_id = product.id, variant_id, "item published");
    Ok(())
}

/// Process a batch of item events.
///
/// Vetoes are tallied and the batch continues; any other failure aborts
/// the batch so the queue layer can redeliver it.
///
/// # Errors
///
/// The first non-veto failure, wrapped with the offending item logged.
pub async fn process_batch<A: ProductApi, I: SkuIndex>(
    manager: &ProductManager<A, I>,
    types: &TypeTable,
    items: &[Item],
) -> Result<BatchReport, SyncError> {
    let mut report = BatchReport::default();

    for item in items {
        match process_item(manager, types, item).await {
            Ok(Outcome::Published) => report.published += 1,
            Ok(Outcome::Retired) => report.retired += 1,
            Ok(Outcome::Vetoed(veto)) => report.vetoed.push(veto),
            Err(error) => {
                warn!(item = %item.public_id, %error, "aborting batch");
                return Err(error);
            }
        }
    }

    Ok(report)
}
