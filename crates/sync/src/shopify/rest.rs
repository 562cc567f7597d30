//! Raw throttled Admin REST client.
//!
//! Every remote call takes one token from the shared throttle before it
//! leaves the process, so the per-store quota holds across however many
//! workers are running. The methods here map one-to-one onto endpoints
//! and stay ignorant of SKUs and the local index; consistency logic lives
//! in [`crate::shopify::manager`].

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::config::ShopifyConfig;
use crate::image;
use crate::shopify::ShopifyError;
use crate::shopify::types::{Image, Product, ProductPayload, Variant, VariantPayload};
use crate::throttle::{Throttle, TokenStore};

/// The raw remote operations the consistency layer is built on.
#[allow(async_fn_in_trait)]
pub trait ProductApi: Send + Sync {
    /// Fetch a product by id. A missing product is `None`, not an error:
    /// callers use it to detect remote deletions.
    async fn get_product(&self, id: i64) -> Result<Option<Product>, ShopifyError>;

    /// Find the product carrying `handle`, which the store keeps unique.
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Product>, ShopifyError>;

    async fn create_product(&self, payload: &ProductPayload) -> Result<Product, ShopifyError>;

    async fn create_variant(
        &self,
        product_id: i64,
        payload: &VariantPayload,
    ) -> Result<Variant, ShopifyError>;

    async fn delete_product(&self, id: i64) -> Result<(), ShopifyError>;

    async fn delete_variant(&self, product_id: i64, variant_id: i64) -> Result<(), ShopifyError>;

    async fn delete_image(&self, product_id: i64, image_id: i64) -> Result<(), ShopifyError>;

    /// Upload a base64-encoded image attachment linked to `variant_id`.
    async fn upload_image(
        &self,
        product_id: i64,
        attachment: &str,
        variant_id: i64,
    ) -> Result<Image, ShopifyError>;

    /// Point `variant_id` at an image that already exists on its product.
    async fn link_variant_image(
        &self,
        variant_id: i64,
        image_id: i64,
    ) -> Result<(), ShopifyError>;

    /// Download the bytes behind an image `src` URL (CDN, not Admin API,
    /// so this does not consume a throttle token).
    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, ShopifyError>;
}

/// HTTP client for the Admin REST API.
///
/// Cheap to clone; clones share one connection pool and one throttle.
pub struct RestProductApi<S> {
    inner: Arc<RestProductApiInner<S>>,
}

impl<S> Clone for RestProductApi<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RestProductApiInner<S> {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_password: SecretString,
    throttle: Throttle<S>,
}

#[derive(Deserialize)]
struct ProductEnvelope {
    product: Product,
}

#[derive(Deserialize)]
struct ProductsEnvelope {
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct VariantEnvelope {
    variant: Variant,
}

#[derive(Deserialize)]
struct ImageEnvelope {
    image: Image,
}

impl<S: TokenStore> RestProductApi<S> {
    #[must_use]
    pub fn new(config: &ShopifyConfig, throttle: Throttle<S>) -> Self {
        Self {
            inner: Arc::new(RestProductApiInner {
                http: reqwest::Client::new(),
                base_url: format!(
                    "https://{}.myshopify.com/admin/api/{}",
                    config.subdomain, config.api_version
                ),
                api_key: config.api_key.clone(),
                app_password: config.app_password.clone(),
                throttle,
            }),
        }
    }

    /// Send one throttled request and surface non-success statuses, with
    /// 404 passed back to the caller.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ShopifyError> {
        let permit = self.inner.throttle.acquire().await?;
        let response = request
            .basic_auth(
                &self.inner.api_key,
                Some(self.inner.app_password.expose_secret()),
            )
            .send()
            .await;
        // The token was spent the moment the request went out; the permit
        // is dropped, not released.
        drop(permit);

        let response = response?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ShopifyError::Api { status, body })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }
}

impl<S: TokenStore> ProductApi for RestProductApi<S> {
    #[instrument(skip(self))]
    async fn get_product(&self, id: i64) -> Result<Option<Product>, ShopifyError> {
        let url = self.url(&format!("/products/{id}.json"));
        let response = self.send(self.inner.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.json::<ProductEnvelope>().await?.product))
    }

    #[instrument(skip(self))]
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Product>, ShopifyError> {
        let url = self.url("/products.json");
        let response = self
            .send(self.inner.http.get(url).query(&[("handle", handle)]))
            .await?;
        let mut products = response.json::<ProductsEnvelope>().await?.products;
        if products.len() > 1 {
            return Err(ShopifyError::DuplicateHandle {
                handle: handle.to_string(),
            });
        }
        Ok(products.pop())
    }

    #[instrument(skip(self, payload), fields(handle = %payload.handle))]
    async fn create_product(&self, payload: &ProductPayload) -> Result<Product, ShopifyError> {
        let url = self.url("/products.json");
        let response = self
            .send(self.inner.http.post(url).json(&json!({ "product": payload })))
            .await?;
        Ok(response.json::<ProductEnvelope>().await?.product)
    }

    #[instrument(skip(self, payload), fields(sku = %payload.sku))]
    async fn create_variant(
        &self,
        product_id: i64,
        payload: &VariantPayload,
    ) -> Result<Variant, ShopifyError> {
        let url = self.url(&format!("/products/{product_id}/variants.json"));
        let response = self
            .send(self.inner.http.post(url).json(&json!({ "variant": payload })))
            .await?;
        Ok(response.json::<VariantEnvelope>().await?.variant)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: i64) -> Result<(), ShopifyError> {
        let url = self.url(&format!("/products/{id}.json"));
        self.send(self.inner.http.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_variant(&self, product_id: i64, variant_id: i64) -> Result<(), ShopifyError> {
        let url = self.url(&format!("/products/{product_id}/variants/{variant_id}.json"));
        self.send(self.inner.http.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_image(&self, product_id: i64, image_id: i64) -> Result<(), ShopifyError> {
        let url = self.url(&format!("/products/{product_id}/images/{image_id}.json"));
        self.send(self.inner.http.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self, attachment))]
    async fn upload_image(
        &self,
        product_id: i64,
        attachment: &str,
        variant_id: i64,
    ) -> Result<Image, ShopifyError> {
        let url = self.url(&format!("/products/{product_id}/images.json"));
        let body = json!({
            "image": {
                "attachment": attachment,
                "variant_ids": [variant_id],
            }
        });
        let response = self.send(self.inner.http.post(url).json(&body)).await?;
        Ok(response.json::<ImageEnvelope>().await?.image)
    }

    #[instrument(skip(self))]
    async fn link_variant_image(
        &self,
        variant_id: i64,
        image_id: i64,
    ) -> Result<(), ShopifyError> {
        let url = self.url(&format!("/variants/{variant_id}.json"));
        let body = json!({
            "variant": {
                "id": variant_id,
                "image_id": image_id,
            }
        });
        self.send(self.inner.http.put(url).json(&body)).await?;
        Ok(())
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, ShopifyError> {
        Ok(image::fetch_bytes(&self.inner.http, url).await?)
    }
}
