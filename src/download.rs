//! Saving generated images
//!
//! Image references are either data URIs or public URLs; both resolve to raw
//! bytes plus a content type, offered under a
//! `fashion-<style>-<n>-<timestamp>.<ext>` file name.

use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data_uri::{DataUri, DataUriError};
use crate::http_body::read_limited;
use crate::normalizer::{has_data_header, is_public_url};
use crate::styles;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("not a downloadable image reference")]
    InvalidReference,

    #[error("could not decode image data: {0}")]
    Decode(#[from] DataUriError),

    #[error("image fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("image host answered {0}")]
    Status(u16),

    #[error("fetched content is not an image")]
    NotAnImage,

    #[error("fetched image is larger than {0} bytes")]
    TooLarge(usize),
}

impl DownloadError {
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::InvalidReference | DownloadError::Decode(_) => "INVALID_REFERENCE",
            DownloadError::Fetch(_)
            | DownloadError::Status(_)
            | DownloadError::NotAnImage
            | DownloadError::TooLarge(_) => "DOWNLOAD_FAILED",
        }
    }
}

/// Image bytes ready to be served as an attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Turn an image reference into bytes, fetching public URLs over HTTP.
///
/// Only content recognised as PNG, JPEG, WebP or GIF is returned, and fetched
/// bodies are capped at `max_bytes`.
pub async fn resolve(
    client: &reqwest::Client,
    reference: &str,
    max_bytes: usize,
) -> Result<ResolvedImage, DownloadError> {
    let reference = reference.trim();

    if has_data_header(reference) {
        let decoded = DataUri::parse(reference)?;
        let content_type = sniff(&decoded.bytes).ok_or(DownloadError::InvalidReference)?;
        return Ok(ResolvedImage {
            content_type: content_type.to_string(),
            bytes: decoded.bytes,
        });
    }

    if !is_public_url(reference) {
        return Err(DownloadError::InvalidReference);
    }

    debug!(url = reference, "Fetching image for download");
    let response = client.get(reference).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status.as_u16()));
    }

    let bytes = read_limited(response, max_bytes)
        .await?
        .ok_or(DownloadError::TooLarge(max_bytes))?;
    let content_type = sniff(&bytes).ok_or_else(|| {
        warn!(url = reference, bytes = bytes.len(), "Fetched content is not an image");
        DownloadError::NotAnImage
    })?;

    info!(url = reference, bytes = bytes.len(), content_type, "Fetched image for download");
    Ok(ResolvedImage {
        content_type: content_type.to_string(),
        bytes,
    })
}

/// File name for the image at 0-based `index`
pub fn file_name(style: &str, index: usize, timestamp_millis: i64, content_type: &str) -> String {
    format!(
        "fashion-{}-{}-{}.{}",
        styles::file_safe(style),
        index + 1,
        timestamp_millis,
        extension_for(content_type)
    )
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

fn sniff(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}
