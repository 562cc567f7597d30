//! Primary-image download and normalization.
//!
//! Product photography arrives in arbitrary aspect ratios; the storefront
//! grid wants squares. Images are padded onto a white square canvas rather
//! than cropped, and deduplicated by a content hash over decoded pixels so
//! the same artwork is never stored twice no matter how it was re-encoded
//! in transit.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ::image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Some CDNs reject requests with no user-agent.
const USER_AGENT: &str = "skubridge/0.1";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Image download or processing failures.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A decoded image ready for hashing, squaring, and upload.
pub struct NormalizedImage {
    inner: DynamicImage,
}

impl NormalizedImage {
    /// Decode raw bytes in any supported container format.
    ///
    /// # Errors
    ///
    /// [`ImageError::Decode`] if the bytes are not a decodable image.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        Ok(Self {
            inner: image::load_from_memory(bytes)?,
        })
    }

    /// Pixel dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Pad onto a centered white square canvas sized to the longest side.
    /// Already-square images pass through untouched.
    #[must_use]
    pub fn squared(self) -> Self {
        let (width, height) = self.inner.dimensions();
        if width == height {
            return self;
        }

        let side = width.max(height);
        let mut canvas = RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255]));
        let x = i64::from((side - width) / 2);
        let y = i64::from((side - height) / 2);
        image::imageops::overlay(&mut canvas, &self.inner.to_rgba8(), x, y);

        Self {
            inner: DynamicImage::ImageRgba8(canvas),
        }
    }

    /// Content hash over dimensions and raw RGBA pixels.
    ///
    /// Hashing decoded pixels instead of container bytes keeps the hash
    /// stable across PNG/JPEG re-encodings that preserve pixel data.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let (width, height) = self.inner.dimensions();
        let mut hasher = Sha256::new();
        hasher.update(width.to_be_bytes());
        hasher.update(height.to_be_bytes());
        hasher.update(self.inner.to_rgba8().as_raw());
        hex::encode(hasher.finalize())
    }

    /// Encode as PNG and wrap in base64 for the image-attachment payload.
    ///
    /// # Errors
    ///
    /// [`ImageError::Decode`] if PNG encoding fails.
    pub fn to_base64_png(&self) -> Result<String, ImageError> {
        let mut buffer = Cursor::new(Vec::new());
        self.inner.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(BASE64.encode(buffer.into_inner()))
    }
}

/// Fetch raw bytes from an image URL.
///
/// # Errors
///
/// [`ImageError::Http`] on connection failure, timeout, or a non-success
/// status.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, ImageError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
