//! Submission to the image generation webhook
//!
//! A submission is validated once into a [`GenerationRequest`], sent as a
//! single POST, and the reply is run through the [`Normalizer`]. Nothing is
//! retried; a failed call surfaces to the caller as a [`GenerationError`].

use image::ImageFormat;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{GenerationMode, Settings, UploadSettings, WebhookSettings};
use crate::data_uri::DataUri;
use crate::http_body::read_limited;
use crate::normalizer::{NormalizeError, Normalized, Normalizer, RawWebhookResponse};
use crate::styles::{self, MAX_STYLE_LEN};

pub const MIN_QUANTITY: u8 = 1;
pub const MAX_QUANTITY: u8 = 6;

/// Problems with a submission, caught before anything leaves the server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("an image must be selected")]
    MissingImage,

    #[error("a style must be selected")]
    MissingStyle,

    #[error("style id is longer than 64 characters")]
    StyleTooLong,

    #[error("quantity must be a whole number between 1 and 6, got {0}")]
    InvalidQuantity(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image is {size} bytes, limit is {max} bytes")]
    ImageTooLarge { size: usize, max: usize },
}

impl InvalidRequest {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidRequest::MissingImage => "MISSING_IMAGE",
            InvalidRequest::MissingStyle => "MISSING_STYLE",
            InvalidRequest::StyleTooLong => "INVALID_STYLE",
            InvalidRequest::InvalidQuantity(_) => "INVALID_QUANTITY",
            InvalidRequest::InvalidImage(_) => "INVALID_IMAGE",
            InvalidRequest::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("webhook response is larger than {0} bytes")]
    ResponseTooLarge(usize),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// One validated submission; also the webhook's JSON body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    image: String,
    style: String,
    quantity: u8,
}

impl GenerationRequest {
    /// Validate raw form input.
    ///
    /// Checks run in order: image present, style present, quantity in range,
    /// image decodes, image within the upload limit, image format recognised.
    /// An absent or `null` quantity means one image.
    pub fn new(
        image_uri: Option<&str>,
        style: Option<&str>,
        quantity: Option<&Value>,
        limits: &UploadSettings,
    ) -> Result<Self, InvalidRequest> {
        let image_uri = image_uri.map(str::trim).filter(|s| !s.is_empty()).ok_or(InvalidRequest::MissingImage)?;
        let style = style.map(str::trim).filter(|s| !s.is_empty()).ok_or(InvalidRequest::MissingStyle)?;

        if style.chars().count() > MAX_STYLE_LEN {
            return Err(InvalidRequest::StyleTooLong);
        }
        if styles::find(style).is_none() {
            debug!(style, "Style is not in the catalog, passing it through");
        }

        let quantity = match quantity {
            None | Some(Value::Null) => MIN_QUANTITY,
            Some(value) => value
                .as_u64()
                .and_then(|q| u8::try_from(q).ok())
                .filter(|q| (MIN_QUANTITY..=MAX_QUANTITY).contains(q))
                .ok_or_else(|| InvalidRequest::InvalidQuantity(value.to_string()))?,
        };

        let decoded = DataUri::parse(image_uri).map_err(|e| InvalidRequest::InvalidImage(e.to_string()))?;
        if !decoded.is_image() {
            return Err(InvalidRequest::InvalidImage(format!("unexpected media type {}", decoded.mime)));
        }
        if decoded.bytes.len() > limits.max_bytes {
            return Err(InvalidRequest::ImageTooLarge {
                size: decoded.bytes.len(),
                max: limits.max_bytes,
            });
        }
        let format = image::guess_format(&decoded.bytes)
            .map_err(|_| InvalidRequest::InvalidImage("unrecognised image format".to_string()))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP | ImageFormat::Gif) {
            return Err(InvalidRequest::InvalidImage(format!("unsupported format {:?}", format)));
        }

        Ok(GenerationRequest {
            image: image_uri.to_string(),
            style: style.to_string(),
            quantity,
        })
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn quantity(&self) -> u8 {
        self.quantity
    }
}

/// Client for the generation webhook
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl WebhookClient {
    /// `max_body_bytes` caps how much of the reply is read.
    pub fn new(client: reqwest::Client, settings: &WebhookSettings, max_body_bytes: usize) -> Self {
        WebhookClient {
            client,
            url: settings.url.clone(),
            timeout: settings.timeout_secs.map(Duration::from_secs),
            max_body_bytes,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the submission and capture the reply body.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<RawWebhookResponse, GenerationError> {
        let start = Instant::now();
        info!(
            style = %request.style,
            quantity = request.quantity,
            "Sending generation request to webhook"
        );

        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = read_limited(response, self.max_body_bytes).await?.ok_or_else(|| {
            warn!(max_bytes = self.max_body_bytes, "Webhook response exceeds size limit");
            GenerationError::ResponseTooLarge(self.max_body_bytes)
        })?;
        let body = String::from_utf8_lossy(&body).into_owned();

        info!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            body_len = body.len(),
            "Webhook responded"
        );
        debug!(body = %preview(&body), "Webhook body");

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        Ok(RawWebhookResponse::from_body(content_type.as_deref(), body))
    }
}

/// Produces images for a submission
#[derive(Debug, Clone)]
pub enum Generator {
    Webhook { client: WebhookClient, normalizer: Normalizer },
    /// Local echo: returns the input image `quantity` times after a delay
    Echo { delay: Duration },
}

impl Generator {
    pub fn from_settings(settings: &Settings, http: reqwest::Client) -> Self {
        match settings.generation.mode {
            GenerationMode::Webhook => Generator::Webhook {
                client: WebhookClient::new(http, &settings.webhook, settings.server.body_limit_bytes),
                normalizer: Normalizer::new(settings.normalizer.clone()),
            },
            GenerationMode::Echo => Generator::Echo {
                delay: Duration::from_millis(settings.generation.echo_delay_ms),
            },
        }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Normalized, GenerationError> {
        match self {
            Generator::Webhook { client, normalizer } => {
                let raw = client.submit(request).await?;
                let normalized = normalizer.normalize(raw).map_err(|e| {
                    warn!(error = %e, "Webhook response could not be normalized");
                    e
                })?;
                info!(
                    images = normalized.images.len(),
                    placeholders = normalized.warnings.len(),
                    "Webhook response normalized"
                );
                Ok(normalized)
            }
            Generator::Echo { delay } => {
                tokio::time::sleep(*delay).await;
                info!(quantity = request.quantity, "Echoing input image");
                Ok(Normalized {
                    images: vec![request.image.clone(); usize::from(request.quantity)],
                    warnings: Vec::new(),
                })
            }
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(500).collect()
}
