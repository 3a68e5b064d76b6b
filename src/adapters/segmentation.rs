// THEORY:
// The Mask Acquisition Adapter. It is the only place that talks to the
// segmentation service, and it hands back exactly one thing: a validated
// `PixelBuffer`, or an error describing why there is none.
//
// Key architectural principles:
// 1.  **Check Before Sending**: The source photograph is sniffed and measured
//     locally. Undecodable or zero-sized images never reach the network.
// 2.  **Bounded Wait**: The whole round trip (upload, status, body, decode) runs
//     under one timeout. A slow service surfaces as `Timeout`, never as a hang.
// 3.  **Decode Off The Runtime**: PNG decoding is CPU work and runs on the
//     blocking pool.
// 4.  **Replaceable Source**: The session depends on the `MaskSource` trait,
//     not on HTTP, so a different segmenter (or a test double) can stand in.

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::config::OverlayConfig;
use crate::core_modules::category_mask::MaskMode;
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use crate::error::AcquisitionError;
use futures::future::BoxFuture;
use image::ImageReader;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Multipart field the service reads the photograph from.
pub const IMAGE_FIELD: &str = "image";

/// A photograph ready to be uploaded, with its format and size already known.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    file_name: String,
    mime: &'static str,
    width: u32,
    height: u32,
}

impl SourceImage {
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, AcquisitionError> {
        let reader = ImageReader::new(Cursor::new(&bytes)).with_guessed_format()?;
        let mime = reader
            .format()
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let (width, height) = reader.into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(AcquisitionError::InvalidDimensions { width, height });
        }
        Ok(Self {
            bytes,
            file_name: file_name.into(),
            mime,
            width,
            height,
        })
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AcquisitionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::from_bytes(file_name, bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Anything that can turn a photograph into a classification buffer.
pub trait MaskSource: Send + Sync {
    fn acquire<'a>(
        &'a self,
        image: &'a SourceImage,
        mode: MaskMode,
    ) -> BoxFuture<'a, Result<PixelBuffer, AcquisitionError>>;
}

/// The `/health` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    pub service: String,
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Deserialize)]
struct ServiceFailure {
    error: String,
}

/// HTTP client for the segmentation service.
#[derive(Debug, Clone)]
pub struct SegmentationClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SegmentationClient {
    pub fn new(config: &OverlayConfig) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("backdrop_sprites/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.segmentation_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads `image` and returns the decoded buffer, all within the timeout.
    pub async fn acquire(
        &self,
        image: &SourceImage,
        mode: MaskMode,
    ) -> Result<PixelBuffer, AcquisitionError> {
        match tokio::time::timeout(self.timeout, self.request(image, mode)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, ?mode, "segmentation timed out");
                Err(AcquisitionError::Timeout(self.timeout))
            }
        }
    }

    async fn request(
        &self,
        image: &SourceImage,
        mode: MaskMode,
    ) -> Result<PixelBuffer, AcquisitionError> {
        let url = format!("{}/{}", self.base_url, mode.endpoint());
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        info!(%url, width = image.width, height = image.height, "requesting segmentation");
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<ServiceFailure>(&body)
                .ok()
                .map(|failure| failure.error);
            return Err(AcquisitionError::Status { status, message });
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "segmentation body received");
        let expected = (image.width, image.height);
        let buffer =
            tokio::task::spawn_blocking(move || decode_mask_body(&body, expected)).await??;
        info!(
            width = buffer.width(),
            height = buffer.height(),
            "segmentation buffer ready"
        );
        Ok(buffer)
    }

    pub async fn health(&self) -> Result<ServiceHealth, AcquisitionError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                status,
                message: None,
            });
        }
        Ok(response.json::<ServiceHealth>().await?)
    }
}

impl MaskSource for SegmentationClient {
    fn acquire<'a>(
        &'a self,
        image: &'a SourceImage,
        mode: MaskMode,
    ) -> BoxFuture<'a, Result<PixelBuffer, AcquisitionError>> {
        Box::pin(SegmentationClient::acquire(self, image, mode))
    }
}

/// Decodes a service response body into a validated RGBA buffer. The
/// response must have the same pixel size as the uploaded photograph.
pub fn decode_mask_body(
    body: &[u8],
    expected: (u32, u32),
) -> Result<PixelBuffer, AcquisitionError> {
    if body.is_empty() {
        return Err(AcquisitionError::EmptyBody);
    }
    let decoded = image::load_from_memory(body)?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 || (width, height) != expected {
        warn!(width, height, ?expected, "segmentation response has the wrong size");
        return Err(AcquisitionError::InvalidDimensions { width, height });
    }
    Ok(PixelBuffer::from_image(decoded)?)
}
