//! Frame capture and downsampling.
//!
//! A grabbed frame is center-cropped to a square, resized to a small fixed
//! edge and JPEG-encoded before it is sent to a classifier. Keeping the
//! payload small bounds both request size and model cost.

use std::fmt;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::config::CaptureConfig;
use crate::error::{Error, Result};

/// Mime type of every image produced by [`downsample`].
pub const JPEG_MIME: &str = "image/jpeg";

/// How frames are downsampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Edge length of the output square.
    pub size: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            size: config.size,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// A compressed image ready to send to a classifier.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    /// Wrap already-encoded bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Parse an image sent as raw base64 or as a `data:` URL.
    ///
    /// Raw base64 is assumed to be JPEG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the payload is empty, the data
    /// URL is not base64, or the base64 does not decode.
    pub fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        let (mime_type, data) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest
                    .split_once(',')
                    .ok_or_else(|| Error::invalid_request("data URL has no payload"))?;
                let mut parts = header.split(';');
                let mime = parts.next().filter(|m| !m.is_empty()).unwrap_or(JPEG_MIME);
                if !parts.any(|p| p == "base64") {
                    return Err(Error::invalid_request("data URL is not base64-encoded"));
                }
                (mime.to_string(), data)
            }
            None => (JPEG_MIME.to_string(), payload),
        };

        if data.is_empty() {
            return Err(Error::invalid_request("image data is empty"));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::invalid_request(format!("image is not valid base64: {e}")))?;

        Ok(Self { bytes, mime_type })
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The image mime type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size of the encoded image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the image has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the bytes.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// The image as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Crop a frame to a centered square, resize it, and encode it as JPEG.
///
/// # Errors
///
/// Returns [`Error::CameraNotReady`] for an empty frame, or an encode error.
pub fn downsample(frame: &DynamicImage, settings: &CaptureSettings) -> Result<EncodedImage> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::CameraNotReady);
    }

    let side = width.min(height);
    let square = frame.crop_imm((width - side) / 2, (height - side) / 2, side, side);
    let resized = square
        .resize_exact(settings.size, settings.size, FilterType::Triangle)
        .to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, settings.jpeg_quality)
        .encode_image(&resized)
        .map_err(|e| Error::ImageEncode {
            message: e.to_string(),
        })?;

    debug!(
        "Downsampled {}x{} frame to {}x{} JPEG ({} bytes)",
        width,
        height,
        settings.size,
        settings.size,
        bytes.len()
    );
    Ok(EncodedImage::new(bytes, JPEG_MIME))
}
