//! SKU-aware consistency layer over the raw product API.
//!
//! The store cannot be queried by Source identifier, so every lookup goes
//! through the durable SKU index first. Index entries drift when another
//! actor deletes remote objects out from under us; [`ProductManager`]
//! treats the store as the source of truth and heals the index in place.
//! Healing is idempotent, which is what makes at-least-once event delivery
//! safe.

use futures::future::join_all;
use tracing::{info, instrument, warn};

use skubridge_core::SkuEntry;

use crate::error::SyncError;
use crate::image::NormalizedImage;
use crate::index::SkuIndex;
use crate::shopify::ShopifyError;
use crate::shopify::rest::ProductApi;
use crate::shopify::types::{Product, ProductPayload, Variant, VariantPayload};

/// What the store actually holds for an index entry.
#[derive(Debug)]
pub enum RemoteState {
    /// The recorded product exists and still carries the recorded variant.
    Found(Product),
    /// The product or the recorded variant is gone; the entry was stale.
    Gone,
}

/// Index-backed product operations.
pub struct ProductManager<A, I> {
    api: A,
    index: I,
}

impl<A: ProductApi, I: SkuIndex> ProductManager<A, I> {
    pub const fn new(api: A, index: I) -> Self {
        Self { api, index }
    }

    #[cfg(test)]
    pub(crate) const fn api(&self) -> &A {
        &self.api
    }

    #[cfg(test)]
    pub(crate) const fn index(&self) -> &I {
        &self.index
    }

    /// Find the remote product owning `sku`.
    ///
    /// An unmapped SKU returns `None` without touching the network. A
    /// mapped SKU is verified against the store; a stale entry is deleted
    /// from the index and reported as `None`, as if it never existed.
    ///
    /// # Errors
    ///
    /// Index or remote API failures. Staleness is never an error.
    #[instrument(skip(self))]
    pub async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>, ShopifyError> {
        let Some(entry) = self.index.get(sku).await? else {
            return Ok(None);
        };

        match self.verify(sku, entry).await? {
            RemoteState::Found(product) => Ok(Some(product)),
            RemoteState::Gone => {
                warn!(sku, product_id = entry.product_id, "healed stale index entry");
                self.index.delete(sku).await?;
                Ok(None)
            }
        }
    }

    /// Check one index entry against the store.
    async fn verify(&self, sku: &str, entry: SkuEntry) -> Result<RemoteState, ShopifyError> {
        let Some(product) = self.api.get_product(entry.product_id).await? else {
            return Ok(RemoteState::Gone);
        };
        // The product may survive while the recorded variant was deleted
        // by another actor.
        if product.variants.iter().any(|v| v.id == entry.variant_id) {
            Ok(RemoteState::Found(product))
        } else {
            warn!(
                sku,
                product_id = entry.product_id,
                variant_id = entry.variant_id,
                "recorded variant missing from its product"
            );
            Ok(RemoteState::Gone)
        }
    }

    /// Find a product by its grouping handle.
    ///
    /// # Errors
    ///
    /// Remote API failures, including [`ShopifyError::DuplicateHandle`].
    pub async fn find_product_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Product>, ShopifyError> {
        self.api.find_by_handle(handle).await
    }

    /// Create a product with its initial variant and index the SKU.
    ///
    /// # Errors
    ///
    /// Remote or index failures, or [`SyncError::MissingInitialVariant`]
    /// if the store returns a product without the variant it was created
    /// with.
    #[instrument(skip(self, payload), fields(handle = %payload.handle))]
    pub async fn create_product(
        &self,
        sku: &str,
        payload: &ProductPayload,
    ) -> Result<Product, SyncError> {
        let product = match self.api.create_product(payload).await {
            Ok(product) => product,
            Err(error) => {
                // The payload is the only way to reproduce a rejected
                // create, so log it whole.
                warn!(
                    payload = %serde_json::to_string(payload).unwrap_or_default(),
                    "product create rejected"
                );
                return Err(error.into());
            }
        };

        let Some(variant) = product.variants.first() else {
            return Err(SyncError::MissingInitialVariant {
                product_id: product.id,
            });
        };
        self.index
            .put(sku, SkuEntry::new(product.id, variant.id))
            .await
            .map_err(ShopifyError::from)?;
        info!(sku, product_id = product.id, "created product");
        Ok(product)
    }

    /// Add a variant to an existing product and index the SKU.
    ///
    /// # Errors
    ///
    /// Remote or index failures.
    #[instrument(skip(self, payload), fields(sku = %payload.sku))]
    pub async fn create_variant(
        &self,
        product_id: i64,
        payload: &VariantPayload,
    ) -> Result<Variant, ShopifyError> {
        let variant = self.api.create_variant(product_id, payload).await?;
        self.index
            .put(&payload.sku, SkuEntry::new(product_id, variant.id))
            .await?;
        info!(sku = %payload.sku, product_id, variant_id = variant.id, "created variant");
        Ok(variant)
    }

    /// Remove the variant carrying `sku` from `product`.
    ///
    /// Removing the last variant deletes the whole product instead, since
    /// the store refuses variantless products. Otherwise an image used
    /// exclusively by this variant is deleted alongside it. The index
    /// entry is removed last, after remote state is settled.
    ///
    /// # Errors
    ///
    /// [`ShopifyError::VariantNotFound`] when `product` has no variant
    /// with `sku`; otherwise remote or index failures.
    #[instrument(skip(self, product), fields(product_id = product.id))]
    pub async fn delete_variant(&self, sku: &str, product: &Product) -> Result<(), ShopifyError> {
        let Some(variant) = product.variant_by_sku(sku) else {
            return Err(ShopifyError::VariantNotFound {
                product_id: product.id,
                sku: sku.to_string(),
            });
        };

        if product.variants.len() == 1 {
            self.api.delete_product(product.id).await?;
            info!(sku, product_id = product.id, "deleted product with its last variant");
        } else {
            // Variant first: if the image delete then fails, a retried
            // event still finds the variant intact rather than stripped
            // of its artwork.
            self.api.delete_variant(product.id, variant.id).await?;
            if let Some(image) = product.image_for_variant(variant.id) {
                if image.variant_ids == [variant.id] {
                    self.api.delete_image(product.id, image.id).await?;
                }
            }
            info!(sku, product_id = product.id, variant_id = variant.id, "deleted variant");
        }

        self.index.delete(sku).await?;
        Ok(())
    }

    /// Download the bytes behind an image URL.
    ///
    /// # Errors
    ///
    /// Remote failures, including non-success statuses.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, ShopifyError> {
        self.api.fetch_image_bytes(url).await
    }

    /// Attach `image` to `variant_id`, reusing an existing product image
    /// when one has identical pixel content.
    ///
    /// Existing images are downloaded and hashed over decoded pixels, so
    /// re-encodings of the same artwork still deduplicate. A download
    /// failure aborts the attach: skipping an unreachable image would
    /// quietly re-upload artwork the product already has. An image that
    /// downloads but does not decode is skipped as a non-match.
    ///
    /// # Errors
    ///
    /// Remote failures, including a failed download of an existing image,
    /// or an encode failure on the upload path.
    #[instrument(skip(self, product, image), fields(product_id = product.id))]
    pub async fn attach_image(
        &self,
        product: &Product,
        variant_id: i64,
        image: &NormalizedImage,
    ) -> Result<(), ShopifyError> {
        let wanted = image.content_hash();

        let downloads = join_all(product.images.iter().map(|existing| async move {
            let bytes = self.api.fetch_image_bytes(&existing.src).await?;
            Ok::<_, ShopifyError>((existing.id, bytes))
        }))
        .await;

        let mut matched = None;
        for download in downloads {
            let (image_id, bytes) = download?;
            match NormalizedImage::decode(&bytes) {
                Ok(decoded) if decoded.content_hash() == wanted => {
                    matched = Some(image_id);
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(image_id, %error, "existing image does not decode, treating as non-match");
                }
            }
        }

        if let Some(image_id) = matched {
            self.api.link_variant_image(variant_id, image_id).await?;
            info!(image_id, variant_id, "reused existing image");
        } else {
            let attachment = image.to_base64_png()?;
            let uploaded = self.api.upload_image(product.id, &attachment, variant_id).await?;
            info!(image_id = uploaded.id, variant_id, "uploaded new image");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemorySkuIndex;
    use crate::shopify::testing::{FakeRemote, png_bytes};

    fn manager(remote: FakeRemote) -> ProductManager<FakeRemote, MemorySkuIndex> {
        ProductManager::new(remote, MemorySkuIndex::new())
    }

    fn payload(sku: &str) -> VariantPayload {
        VariantPayload {
            sku: sku.to_string(),
            price: "10".parse().expect("decimal"),
            compare_at_price: None,
            taxable: true,
            option1: None,
            option2: None,
            option3: None,
            barcode: None,
            fulfillment_service: "retail-pos".to_string(),
            inventory_management: "shopify".to_string(),
            inventory_policy: "deny".to_string(),
            weight: 1,
            weight_unit: "kg".to_string(),
            requires_shipping: true,
        }
    }

    fn product_payload(handle: &str, sku: &str) -> ProductPayload {
        ProductPayload {
            product_type: None,
            title: "Alpine Jacket".to_string(),
            body_html: None,
            handle: handle.to_string(),
            vendor: "Summit Co".to_string(),
            variants: vec![payload(sku)],
            options: vec![],
            tags: String::new(),
        }
    }

    #[tokio::test]
    async fn unmapped_sku_never_touches_the_network() {
        let remote = FakeRemote::default();
        let mgr = manager(remote);

        let found = mgr.find_product_by_sku("10042").await.expect("lookup");
        assert!(found.is_none());
        assert_eq!(mgr.api.get_product_calls(), 0);
    }

    #[tokio::test]
    async fn stale_entry_is_healed_and_healing_is_idempotent() {
        let remote = FakeRemote::default();
        let mgr = manager(remote);
        mgr.index
            .put("10042", SkuEntry::new(999, 1))
            .await
            .expect("seed");

        assert!(mgr.find_product_by_sku("10042").await.expect("first").is_none());
        assert_eq!(mgr.index.get("10042").await.expect("get"), None);

        // Re-delivery of the same event sees a clean miss.
        assert!(mgr.find_product_by_sku("10042").await.expect("second").is_none());
        assert_eq!(mgr.api.get_product_calls(), 1);
    }

    #[tokio::test]
    async fn missing_recorded_variant_counts_as_gone() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042"]);
        let mgr = manager(remote);
        mgr.index
            .put("10042", SkuEntry::new(product.id, 424242))
            .await
            .expect("seed");

        assert!(mgr.find_product_by_sku("10042").await.expect("lookup").is_none());
        assert_eq!(mgr.index.get("10042").await.expect("get"), None);
    }

    #[tokio::test]
    async fn intact_entry_returns_the_product() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042"]);
        let variant_id = product.variants[0].id;
        let mgr = manager(remote);
        mgr.index
            .put("10042", SkuEntry::new(product.id, variant_id))
            .await
            .expect("seed");

        let found = mgr
            .find_product_by_sku("10042")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.id, product.id);
    }

    #[tokio::test]
    async fn create_product_indexes_the_initial_variant() {
        let remote = FakeRemote::default();
        let mgr = manager(remote);

        let product = mgr
            .create_product("10042", &product_payload("h1", "10042"))
            .await
            .expect("create");

        let entry = mgr.index.get("10042").await.expect("get").expect("indexed");
        assert_eq!(entry.product_id, product.id);
        assert_eq!(entry.variant_id, product.variants[0].id);
    }

    #[tokio::test]
    async fn create_variant_indexes_the_sku() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042"]);
        let mgr = manager(remote);

        let variant = mgr
            .create_variant(product.id, &payload("10043"))
            .await
            .expect("create");

        assert_eq!(
            mgr.index.get("10043").await.expect("get"),
            Some(SkuEntry::new(product.id, variant.id))
        );
    }

    #[tokio::test]
    async fn deleting_the_last_variant_deletes_the_product() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042"]);
        let mgr = manager(remote);
        mgr.index
            .put("10042", SkuEntry::new(product.id, product.variants[0].id))
            .await
            .expect("seed");

        mgr.delete_variant("10042", &product).await.expect("delete");

        assert!(mgr.api.get_product(product.id).await.expect("get").is_none());
        assert_eq!(mgr.index.get("10042").await.expect("get"), None);
    }

    #[tokio::test]
    async fn deleting_a_middle_variant_keeps_the_product() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let mgr = manager(remote);

        mgr.delete_variant("10042", &product).await.expect("delete");

        let remaining = mgr
            .api
            .get_product(product.id)
            .await
            .expect("get")
            .expect("still there");
        assert_eq!(remaining.variants.len(), 1);
        assert_eq!(remaining.variants[0].sku, "10043");
    }

    #[tokio::test]
    async fn exclusive_image_dies_with_its_variant() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let target = product.variants[0].id;
        remote.seed_image(product.id, &[target], &png_bytes(4, 4, [1, 2, 3, 255]));
        let product = remote.get_product(product.id).await.expect("get").expect("seeded");
        let mgr = manager(remote);

        mgr.delete_variant("10042", &product).await.expect("delete");

        let remaining = mgr
            .api
            .get_product(product.id)
            .await
            .expect("get")
            .expect("still there");
        assert!(remaining.images.is_empty());
    }

    #[tokio::test]
    async fn shared_image_survives_variant_deletion() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let both = [product.variants[0].id, product.variants[1].id];
        remote.seed_image(product.id, &both, &png_bytes(4, 4, [1, 2, 3, 255]));
        let product = remote.get_product(product.id).await.expect("get").expect("seeded");
        let mgr = manager(remote);

        mgr.delete_variant("10042", &product).await.expect("delete");

        let remaining = mgr
            .api
            .get_product(product.id)
            .await
            .expect("get")
            .expect("still there");
        assert_eq!(remaining.images.len(), 1);
    }

    #[tokio::test]
    async fn variant_is_deleted_before_its_exclusive_image() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let target = product.variants[0].id;
        let image = remote.seed_image(product.id, &[target], &png_bytes(4, 4, [1, 2, 3, 255]));
        let product = remote.get_product(product.id).await.expect("get").expect("seeded");
        let mgr = manager(remote);

        mgr.delete_variant("10042", &product).await.expect("delete");

        assert_eq!(
            mgr.api.deletions(),
            vec![format!("variant:{target}"), format!("image:{}", image.id)]
        );
    }

    #[tokio::test]
    async fn deleting_an_unknown_sku_is_an_error() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042"]);
        let mgr = manager(remote);

        let err = mgr
            .delete_variant("99999", &product)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ShopifyError::VariantNotFound { .. }));
    }

    #[tokio::test]
    async fn identical_artwork_is_linked_not_reuploaded() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let first = product.variants[0].id;
        let second = product.variants[1].id;

        let bytes = png_bytes(8, 8, [200, 100, 50, 255]);
        let decoded = NormalizedImage::decode(&bytes).expect("decode");

        let mgr = manager(remote);
        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        mgr.attach_image(&product, first, &decoded).await.expect("first attach");

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        assert_eq!(product.images.len(), 1);

        mgr.attach_image(&product, second, &decoded).await.expect("second attach");

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        assert_eq!(product.images.len(), 1, "same pixels must not upload twice");
        let image = &product.images[0];
        assert!(image.variant_ids.contains(&first));
        assert!(image.variant_ids.contains(&second));
    }

    #[tokio::test]
    async fn unreachable_existing_image_aborts_the_attach() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let second = product.variants[1].id;
        let bytes = png_bytes(8, 8, [200, 100, 50, 255]);
        let existing = remote.seed_image(product.id, &[product.variants[0].id], &bytes);
        remote.withhold_bytes(&existing.src);
        let mgr = manager(remote);

        let decoded = NormalizedImage::decode(&bytes).expect("decode");
        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        let err = mgr
            .attach_image(&product, second, &decoded)
            .await
            .expect_err("a failed download must not be treated as a non-match");
        assert!(matches!(err, ShopifyError::Api { .. }));

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        assert_eq!(product.images.len(), 1, "nothing may be uploaded on the error path");
    }

    #[tokio::test]
    async fn undecodable_existing_image_counts_as_non_match() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let second = product.variants[1].id;
        remote.seed_image(product.id, &[product.variants[0].id], b"not an image");
        let mgr = manager(remote);

        let decoded =
            NormalizedImage::decode(&png_bytes(8, 8, [200, 100, 50, 255])).expect("decode");
        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        mgr.attach_image(&product, second, &decoded).await.expect("attach");

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        assert_eq!(product.images.len(), 2);
    }

    #[tokio::test]
    async fn different_artwork_is_uploaded() {
        let remote = FakeRemote::default();
        let product = remote.seed_product("h1", &["10042", "10043"]);
        let first = product.variants[0].id;
        let second = product.variants[1].id;
        let mgr = manager(remote);

        let a = NormalizedImage::decode(&png_bytes(8, 8, [0, 0, 0, 255])).expect("decode");
        let b = NormalizedImage::decode(&png_bytes(8, 8, [255, 255, 255, 255])).expect("decode");

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        mgr.attach_image(&product, first, &a).await.expect("first attach");
        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        mgr.attach_image(&product, second, &b).await.expect("second attach");

        let product = mgr.api.get_product(product.id).await.expect("get").expect("seeded");
        assert_eq!(product.images.len(), 2);
    }
}
