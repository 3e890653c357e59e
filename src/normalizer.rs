//! Webhook response normalization
//!
//! The generation webhook has no fixed reply contract. Depending on the
//! provider behind it the body can be a JSON object, a JSON array, a bare
//! data URI or a public URL, with image payloads buried under a handful of
//! conventional field names. This module turns any of those into an ordered
//! list of displayable image references.
//!
//! Bad entries never abort the whole reply: each one is swapped for the
//! placeholder image and reported as an [`EntryWarning`], so positions in the
//! output line up with positions in the reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Fallback image shown in place of any entry that fails validation
pub const PLACEHOLDER_IMAGE: &str =
    "https://placehold.co/512x768/f3f4f6/9ca3af/png?text=Image+unavailable";

/// Header prepended to bare base64 payloads
pub const DEFAULT_DATA_HEADER: &str = "data:image/png;base64,";

const DATA_IMAGE_PREFIX: &str = "data:image";

/// Object fields searched for image payloads, in concatenation order
const IMAGE_FIELDS: [&str; 7] = ["image", "url", "base64", "b64_json", "data", "images", "output"];

/// Tunables for the normalizer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizerPolicy {
    /// Minimum plausible length, in characters, of a normalized data URI
    pub min_length: usize,
    /// Maximum nesting depth followed while flattening an entry
    pub max_depth: usize,
    /// Reference substituted for invalid entries
    pub placeholder_url: String,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        NormalizerPolicy {
            min_length: 100,
            max_depth: 10,
            placeholder_url: PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Webhook body as received, before any interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum RawWebhookResponse {
    Json(Value),
    Text(String),
}

impl RawWebhookResponse {
    /// Classify a response body using its declared content type.
    ///
    /// A body that claims to be JSON but does not parse is kept as text so the
    /// text path can report it properly.
    pub fn from_body(content_type: Option<&str>, body: String) -> Self {
        let declared_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if declared_json {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                return RawWebhookResponse::Json(value);
            }
            debug!("Body declared as JSON did not parse, falling back to text handling");
        }

        RawWebhookResponse::Text(body)
    }
}

/// Failures that reject a whole webhook reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("webhook returned an empty response")]
    EmptyResponse,

    #[error("webhook returned malformed JSON: {0}")]
    InvalidJson(String),

    #[error("webhook response is neither JSON nor an image reference")]
    UnsupportedFormat,

    #[error("webhook response contains no images")]
    NoImagesFound,
}

impl NormalizeError {
    /// Stable machine-readable code for API replies
    pub fn code(&self) -> &'static str {
        match self {
            NormalizeError::EmptyResponse => "EMPTY_RESPONSE",
            NormalizeError::InvalidJson(_) => "INVALID_JSON",
            NormalizeError::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            NormalizeError::NoImagesFound => "NO_IMAGES_FOUND",
        }
    }
}

/// Why a single entry was replaced by the placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryIssue {
    /// The entry carried nothing that looks like image data
    Missing,
    Empty,
    TooShort { length: usize, minimum: usize },
    NotAnImage,
}

impl fmt::Display for EntryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryIssue::Missing => write!(f, "no image data in entry"),
            EntryIssue::Empty => write!(f, "empty image data"),
            EntryIssue::TooShort { length, minimum } => {
                write!(f, "image data too short ({} < {} characters)", length, minimum)
            }
            EntryIssue::NotAnImage => write!(f, "not an image reference"),
        }
    }
}

/// Per-index notice that an entry was replaced by the placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryWarning {
    /// 0-based position in the output list
    pub index: usize,
    pub issue: EntryIssue,
}

/// Normalizer output: references in reply order plus substitution notices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Normalized {
    pub images: Vec<String>,
    pub warnings: Vec<EntryWarning>,
}

impl Normalized {
    fn push_valid(&mut self, reference: String) {
        self.images.push(reference);
    }

    fn push_placeholder(&mut self, placeholder: &str, issue: EntryIssue) {
        let index = self.images.len();
        warn!(index, issue = %issue, "Replacing invalid image entry with placeholder");
        self.images.push(placeholder.to_string());
        self.warnings.push(EntryWarning { index, issue });
    }
}

enum TextBody {
    Json(Value),
    Image(String),
}

/// Turns webhook replies into image references
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: NormalizerPolicy,
}

impl Normalizer {
    pub fn new(policy: NormalizerPolicy) -> Self {
        Normalizer { policy }
    }

    pub fn policy(&self) -> &NormalizerPolicy {
        &self.policy
    }

    /// Normalize a webhook reply into an ordered list of image references.
    pub fn normalize(&self, raw: RawWebhookResponse) -> Result<Normalized, NormalizeError> {
        let value = match raw {
            RawWebhookResponse::Json(value) => value,
            RawWebhookResponse::Text(text) => match parse_text(&text)? {
                TextBody::Json(value) => value,
                TextBody::Image(candidate) => return Ok(self.normalize_slots(vec![vec![candidate]])),
            },
        };

        let entries = extract_entries(value);
        if entries.is_empty() {
            return Err(NormalizeError::NoImagesFound);
        }

        let slots: Vec<Vec<String>> = entries
            .iter()
            .map(|entry| {
                let mut candidates = Vec::new();
                self.flatten(entry, 0, &mut candidates);
                candidates
            })
            .collect();

        if slots.iter().all(Vec::is_empty) {
            return Err(NormalizeError::NoImagesFound);
        }

        Ok(self.normalize_slots(slots))
    }

    /// Re-check references that are already normalized.
    ///
    /// Valid references and the placeholder pass through untouched, so running
    /// the normalizer's own output through here returns it unchanged.
    pub fn validate_references(&self, references: &[String]) -> Normalized {
        let mut out = Normalized::default();
        for reference in references {
            match self.validate(reference) {
                Ok(()) => out.push_valid(reference.clone()),
                Err(issue) => out.push_placeholder(&self.policy.placeholder_url, issue),
            }
        }
        out
    }

    /// Each slot holds the flattened candidates of one reply entry. A slot
    /// that flattened to nothing still occupies one output position.
    fn normalize_slots(&self, slots: Vec<Vec<String>>) -> Normalized {
        let mut out = Normalized::default();
        for slot in slots {
            if slot.is_empty() {
                out.push_placeholder(&self.policy.placeholder_url, EntryIssue::Missing);
                continue;
            }
            for candidate in slot {
                match self.normalize_candidate(&candidate) {
                    Ok(reference) => out.push_valid(reference),
                    Err(issue) => out.push_placeholder(&self.policy.placeholder_url, issue),
                }
            }
        }
        out
    }

    fn normalize_candidate(&self, candidate: &str) -> Result<String, EntryIssue> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(EntryIssue::Empty);
        }

        let deduped = strip_repeated_headers(trimmed);
        let reference = if is_public_url(deduped) || has_data_header(deduped) {
            deduped.to_string()
        } else {
            format!("{}{}", DEFAULT_DATA_HEADER, deduped)
        };

        self.validate(&reference)?;
        Ok(reference)
    }

    fn validate(&self, reference: &str) -> Result<(), EntryIssue> {
        if reference == self.policy.placeholder_url {
            return Ok(());
        }
        if reference.is_empty() {
            return Err(EntryIssue::Empty);
        }
        if is_public_url(reference) {
            return Ok(());
        }

        let length = reference.chars().count();
        if length < self.policy.min_length {
            return Err(EntryIssue::TooShort {
                length,
                minimum: self.policy.min_length,
            });
        }

        if !has_data_header(reference) {
            return Err(EntryIssue::NotAnImage);
        }

        Ok(())
    }

    fn flatten(&self, value: &Value, depth: usize, out: &mut Vec<String>) {
        if depth > self.policy.max_depth {
            warn!(depth, "Image entry nested too deeply, ignoring remainder");
            return;
        }

        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => {
                for item in items {
                    self.flatten(item, depth + 1, out);
                }
            }
            Value::Object(map) => {
                for field in IMAGE_FIELDS {
                    if let Some(inner) = map.get(field) {
                        self.flatten(inner, depth + 1, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn parse_text(text: &str) -> Result<TextBody, NormalizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::EmptyResponse);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map(TextBody::Json)
            .map_err(|e| NormalizeError::InvalidJson(e.to_string()));
    }

    if has_data_header(trimmed) || is_public_url(trimmed) {
        return Ok(TextBody::Image(trimmed.to_string()));
    }

    Err(NormalizeError::UnsupportedFormat)
}

/// Candidate entries, by precedence: an array under `data`, the value itself
/// if it is an array, `data` as a single entry, the whole value as a single
/// entry.
fn extract_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => vec![Value::Object(map)],
            Some(data) => vec![data],
        },
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Drops headers that were embedded more than once, keeping the innermost.
fn strip_repeated_headers(candidate: &str) -> &str {
    let mut current = candidate;
    while has_data_header(current) {
        match current.split_once(',') {
            Some((_, rest)) if has_data_header(rest.trim_start()) => current = rest.trim_start(),
            _ => break,
        }
    }
    current
}

pub(crate) fn has_data_header(s: &str) -> bool {
    starts_with_ignore_case(s, DATA_IMAGE_PREFIX)
}

pub(crate) fn is_public_url(s: &str) -> bool {
    starts_with_ignore_case(s, "http://") || starts_with_ignore_case(s, "https://")
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(len: usize) -> String {
        "A".repeat(len)
    }

    fn data_uri(len: usize) -> String {
        format!("data:image/png;base64,{}", payload(len))
    }

    fn normalize_json(value: Value) -> Result<Normalized, NormalizeError> {
        Normalizer::default().normalize(RawWebhookResponse::Json(value))
    }

    fn normalize_text(text: &str) -> Result<Normalized, NormalizeError> {
        Normalizer::default().normalize(RawWebhookResponse::Text(text.to_string()))
    }

    #[test]
    fn test_data_uri_passes_through_unchanged() {
        let uri = data_uri(120);
        let result = normalize_json(json!({ "data": [uri.clone()] })).unwrap();
        assert_eq!(result.images, vec![uri]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_short_entry_becomes_placeholder() {
        let result = normalize_json(json!({ "data": ["short"] })).unwrap();
        assert_eq!(result.images, vec![PLACEHOLDER_IMAGE.to_string()]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].index, 0);
        assert!(matches!(result.warnings[0].issue, EntryIssue::TooShort { minimum: 100, .. }));
    }

    #[test]
    fn test_url_under_image_field() {
        let result = normalize_json(json!({ "data": [{ "image": "https://example.com/a.png" }] })).unwrap();
        assert_eq!(result.images, vec!["https://example.com/a.png".to_string()]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_bare_url_text_body() {
        let result = normalize_text("  https://example.com/a.png\n").unwrap();
        assert_eq!(result.images, vec!["https://example.com/a.png".to_string()]);
    }

    #[test]
    fn test_min_length_is_configurable() {
        let policy = NormalizerPolicy { min_length: 10, ..NormalizerPolicy::default() };
        let result = Normalizer::new(policy)
            .normalize(RawWebhookResponse::Json(json!(["iVBORw0KGgo"])))
            .unwrap();
        assert_eq!(result.images, vec!["data:image/png;base64,iVBORw0KGgo".to_string()]);
    }

    #[test]
    fn test_bare_data_uri_text_body() {
        let uri = data_uri(200);
        let result = normalize_text(&uri).unwrap();
        assert_eq!(result.images, vec![uri]);
    }

    #[test]
    fn test_text_failures() {
        assert_eq!(normalize_text(""), Err(NormalizeError::EmptyResponse));
        assert_eq!(normalize_text("   \n\t"), Err(NormalizeError::EmptyResponse));
        assert_eq!(normalize_text("not json at all"), Err(NormalizeError::UnsupportedFormat));
        assert!(matches!(normalize_text("{bad json"), Err(NormalizeError::InvalidJson(_))));
        assert!(matches!(normalize_text("[1, 2"), Err(NormalizeError::InvalidJson(_))));
    }

    #[test]
    fn test_text_body_containing_json() {
        let body = json!({ "data": [payload(150)] }).to_string();
        let result = normalize_text(&body).unwrap();
        assert_eq!(result.images, vec![format!("{}{}", DEFAULT_DATA_HEADER, payload(150))]);
    }

    #[test]
    fn test_empty_candidates() {
        assert_eq!(normalize_json(json!({ "data": [] })), Err(NormalizeError::NoImagesFound));
        assert_eq!(normalize_json(json!([])), Err(NormalizeError::NoImagesFound));
        assert_eq!(normalize_json(json!({ "error": "quota exceeded" })), Err(NormalizeError::NoImagesFound));
    }

    #[test]
    fn test_bare_base64_gets_png_header() {
        let result = normalize_json(json!([payload(130)])).unwrap();
        assert_eq!(result.images, vec![format!("data:image/png;base64,{}", payload(130))]);
    }

    #[test]
    fn test_existing_header_is_kept() {
        let jpeg = format!("data:image/jpeg;base64,{}", payload(130));
        let result = normalize_json(json!([jpeg.clone()])).unwrap();
        assert_eq!(result.images, vec![jpeg]);
    }

    #[test]
    fn test_repeated_header_is_collapsed() {
        let inner = format!("data:image/jpeg;base64,{}", payload(130));
        let doubled = format!("data:image/png;base64,{}", inner);
        let result = normalize_json(json!({ "data": [doubled] })).unwrap();
        assert_eq!(result.images, vec![inner]);
    }

    #[test]
    fn test_data_field_as_single_object() {
        let value = json!({ "data": { "images": [payload(120), payload(140)] } });
        let result = normalize_json(value).unwrap();
        assert_eq!(result.images.len(), 2);
        assert!(result.images[1].ends_with(&payload(140)));
    }

    #[test]
    fn test_whole_object_as_single_entry() {
        let value = json!({ "output": [data_uri(120)], "status": "succeeded" });
        let result = normalize_json(value).unwrap();
        assert_eq!(result.images, vec![data_uri(120)]);
    }

    #[test]
    fn test_field_order_is_preserved() {
        let value = json!({
            "data": [{
                "output": data_uri(103),
                "base64": payload(102),
                "image": data_uri(101),
            }]
        });
        let result = normalize_json(value).unwrap();
        assert_eq!(
            result.images,
            vec![data_uri(101), format!("{}{}", DEFAULT_DATA_HEADER, payload(102)), data_uri(103)]
        );
    }

    #[test]
    fn test_entry_without_image_data_keeps_its_slot() {
        let value = json!({ "data": [data_uri(120), { "note": "filtered" }, null, data_uri(130)] });
        let result = normalize_json(value).unwrap();
        assert_eq!(result.images.len(), 4);
        assert_eq!(result.images[1], PLACEHOLDER_IMAGE);
        assert_eq!(result.images[2], PLACEHOLDER_IMAGE);
        assert_eq!(result.images[3], data_uri(130));
        let indexes: Vec<usize> = result.warnings.iter().map(|w| w.index).collect();
        assert_eq!(indexes, vec![1, 2]);
        assert_eq!(result.warnings[0].issue, EntryIssue::Missing);
    }

    #[test]
    fn test_empty_string_entry() {
        let value = json!({ "data": ["   ", data_uri(120)] });
        let result = normalize_json(value).unwrap();
        assert_eq!(result.images[0], PLACEHOLDER_IMAGE);
        assert_eq!(result.warnings[0].issue, EntryIssue::Empty);
    }

    #[test]
    fn test_depth_guard() {
        let mut nested = json!(data_uri(120));
        for _ in 0..20 {
            nested = json!([nested]);
        }
        let value = json!({ "data": [nested, data_uri(110)] });
        let result = normalize_json(value).unwrap();
        assert_eq!(result.images, vec![PLACEHOLDER_IMAGE.to_string(), data_uri(110)]);

        let policy = NormalizerPolicy { max_depth: 30, ..NormalizerPolicy::default() };
        let mut nested = json!(data_uri(120));
        for _ in 0..20 {
            nested = json!([nested]);
        }
        let result = Normalizer::new(policy)
            .normalize(RawWebhookResponse::Json(json!({ "data": [nested] })))
            .unwrap();
        assert_eq!(result.images, vec![data_uri(120)]);
    }

    #[test]
    fn test_output_is_idempotent_under_validation() {
        let value = json!({ "data": ["short", data_uri(120), { "url": format!("https://cdn.example.com/{}", payload(100)) }] });
        let normalizer = Normalizer::default();
        let first = normalizer.normalize(RawWebhookResponse::Json(value)).unwrap();
        let second = normalizer.validate_references(&first.images);
        assert_eq!(second.images, first.images);
        assert!(second.warnings.is_empty());
    }

    #[test]
    fn test_from_body_respects_content_type() {
        let body = r#"{"data": []}"#.to_string();
        assert!(matches!(
            RawWebhookResponse::from_body(Some("application/json; charset=utf-8"), body.clone()),
            RawWebhookResponse::Json(_)
        ));
        assert!(matches!(
            RawWebhookResponse::from_body(Some("text/plain"), body),
            RawWebhookResponse::Text(_)
        ));
        assert!(matches!(
            RawWebhookResponse::from_body(Some("application/json"), "{bad".to_string()),
            RawWebhookResponse::Text(_)
        ));
    }

    #[test]
    fn test_deterministic() {
        let value = json!({ "data": ["x", data_uri(150), [payload(120), 7]] });
        let a = normalize_json(value.clone()).unwrap();
        let b = normalize_json(value).unwrap();
        assert_eq!(a, b);
    }
}
