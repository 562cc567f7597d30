//! In-memory stand-in for the Admin REST API.
//!
//! Models just enough remote behavior for the consistency layer's tests:
//! products with variants and images, unique ids, and image bytes served
//! back by `src` URL. A call counter on `get_product` lets tests assert
//! which lookups hit the network.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ::image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::StatusCode;

use crate::shopify::ShopifyError;
use crate::shopify::rest::ProductApi;
use crate::shopify::types::{Image, Product, ProductPayload, Variant, VariantPayload};

/// Encode a solid-color PNG for image tests.
pub(crate) fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(pixel)));
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .expect("png encode");
    buffer.into_inner()
}

#[derive(Default)]
struct RemoteInner {
    products: Vec<Product>,
    image_bytes: HashMap<String, Vec<u8>>,
    next_id: i64,
    get_product_calls: usize,
    deletions: Vec<String>,
}

impl RemoteInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fake remote store.
#[derive(Default)]
pub(crate) struct FakeRemote {
    inner: Mutex<RemoteInner>,
}

impl FakeRemote {
    /// Seed a product with one variant per SKU.
    pub fn seed_product(&self, handle: &str, skus: &[&str]) -> Product {
        let mut inner = self.inner.lock().expect("lock");
        let id = inner.next_id();
        let variants = skus
            .iter()
            .map(|sku| Variant {
                id: inner.next_id(),
                sku: (*sku).to_string(),
                image_id: None,
            })
            .collect();
        let product = Product {
            id,
            handle: Some(handle.to_string()),
            variants,
            images: vec![],
        };
        inner.products.push(product.clone());
        product
    }

    /// Seed an image on a product, linked to the given variants.
    pub fn seed_image(&self, product_id: i64, variant_ids: &[i64], bytes: &[u8]) -> Image {
        let mut inner = self.inner.lock().expect("lock");
        let id = inner.next_id();
        let image = Image {
            id,
            src: format!("fake://images/{id}"),
            variant_ids: variant_ids.to_vec(),
        };
        inner.image_bytes.insert(image.src.clone(), bytes.to_vec());
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .expect("seeded product");
        for variant in &mut product.variants {
            if variant_ids.contains(&variant.id) {
                variant.image_id = Some(id);
            }
        }
        product.images.push(image.clone());
        image
    }

    /// Serve raw bytes for an arbitrary URL, for Source-side image fetches.
    pub fn serve_bytes(&self, url: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .expect("lock")
            .image_bytes
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn get_product_calls(&self) -> usize {
        self.inner.lock().expect("lock").get_product_calls
    }

    /// Stop serving bytes for a URL, simulating an unreachable image.
    pub fn withhold_bytes(&self, url: &str) {
        self.inner.lock().expect("lock").image_bytes.remove(url);
    }

    /// Delete calls in the order the remote received them.
    pub fn deletions(&self) -> Vec<String> {
        self.inner.lock().expect("lock").deletions.clone()
    }
}

fn not_found(what: &str) -> ShopifyError {
    ShopifyError::Api {
        status: StatusCode::NOT_FOUND,
        body: what.to_string(),
    }
}

impl ProductApi for FakeRemote {
    async fn get_product(&self, id: i64) -> Result<Option<Product>, ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.get_product_calls += 1;
        Ok(inner.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<Product>, ShopifyError> {
        let inner = self.inner.lock().expect("lock");
        let mut matches = inner
            .products
            .iter()
            .filter(|p| p.handle.as_deref() == Some(handle));
        let first = matches.next().cloned();
        if matches.next().is_some() {
            return Err(ShopifyError::DuplicateHandle {
                handle: handle.to_string(),
            });
        }
        Ok(first)
    }

    async fn create_product(&self, payload: &ProductPayload) -> Result<Product, ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        let id = inner.next_id();
        let variants = payload
            .variants
            .iter()
            .map(|v| Variant {
                id: inner.next_id(),
                sku: v.sku.clone(),
                image_id: None,
            })
            .collect();
        let product = Product {
            id,
            handle: Some(payload.handle.clone()),
            variants,
            images: vec![],
        };
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn create_variant(
        &self,
        product_id: i64,
        payload: &VariantPayload,
    ) -> Result<Variant, ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        let id = inner.next_id();
        let variant = Variant {
            id,
            sku: payload.sku.clone(),
            image_id: None,
        };
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| not_found("product"))?;
        product.variants.push(variant.clone());
        Ok(variant)
    }

    async fn delete_product(&self, id: i64) -> Result<(), ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.deletions.push(format!("product:{id}"));
        inner.products.retain(|p| p.id != id);
        Ok(())
    }

    async fn delete_variant(&self, product_id: i64, variant_id: i64) -> Result<(), ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.deletions.push(format!("variant:{variant_id}"));
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| not_found("product"))?;
        product.variants.retain(|v| v.id != variant_id);
        for image in &mut product.images {
            image.variant_ids.retain(|id| *id != variant_id);
        }
        Ok(())
    }

    async fn delete_image(&self, product_id: i64, image_id: i64) -> Result<(), ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.deletions.push(format!("image:{image_id}"));
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| not_found("product"))?;
        product.images.retain(|i| i.id != image_id);
        for variant in &mut product.variants {
            if variant.image_id == Some(image_id) {
                variant.image_id = None;
            }
        }
        Ok(())
    }

    async fn upload_image(
        &self,
        product_id: i64,
        attachment: &str,
        variant_id: i64,
    ) -> Result<Image, ShopifyError> {
        let bytes = BASE64
            .decode(attachment)
            .map_err(|e| ShopifyError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: e.to_string(),
            })?;
        let mut inner = self.inner.lock().expect("lock");
        let id = inner.next_id();
        let image = Image {
            id,
            src: format!("fake://images/{id}"),
            variant_ids: vec![variant_id],
        };
        inner.image_bytes.insert(image.src.clone(), bytes);
        let product = inner
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| not_found("product"))?;
        for variant in &mut product.variants {
            if variant.id == variant_id {
                variant.image_id = Some(id);
            }
        }
        product.images.push(image.clone());
        Ok(image)
    }

    async fn link_variant_image(
        &self,
        variant_id: i64,
        image_id: i64,
    ) -> Result<(), ShopifyError> {
        let mut inner = self.inner.lock().expect("lock");
        for product in &mut inner.products {
            let Some(image) = product.images.iter_mut().find(|i| i.id == image_id) else {
                continue;
            };
            if !image.variant_ids.contains(&variant_id) {
                image.variant_ids.push(variant_id);
            }
            for variant in &mut product.variants {
                if variant.id == variant_id {
                    variant.image_id = Some(image_id);
                }
            }
            return Ok(());
        }
        Err(not_found("image"))
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, ShopifyError> {
        self.inner
            .lock()
            .expect("lock")
            .image_bytes
            .get(url)
            .cloned()
            .ok_or_else(|| not_found("image bytes"))
    }
}
