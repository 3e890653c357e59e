//! `data:` URI decoding

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUriError {
    #[error("not a data URI")]
    NotDataUri,

    #[error("data URI is not base64 encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// A decoded `data:<mime>;base64,<payload>` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn parse(uri: &str) -> Result<Self, DataUriError> {
        let uri = uri.trim();
        let rest = match uri.get(..5) {
            Some(scheme) if scheme.eq_ignore_ascii_case("data:") => &uri[5..],
            _ => return Err(DataUriError::NotDataUri),
        };

        let (meta, payload) = rest.split_once(',').ok_or(DataUriError::NotDataUri)?;

        let mut params = meta.split(';');
        let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(DataUriError::NotBase64);
        }

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = general_purpose::STANDARD
            .decode(&compact)
            .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(&compact))
            .map_err(|e| DataUriError::Payload(e.to_string()))?;

        Ok(DataUri { mime, bytes })
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png_uri() {
        let uri = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(b"hello"));
        let parsed = DataUri::parse(&uri).unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.bytes, b"hello");
        assert!(parsed.is_image());
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_missing_padding() {
        let parsed = DataUri::parse("DATA:Image/JPEG;base64,aGVs\nbG8").unwrap();
        assert_eq!(parsed.mime, "image/jpeg");
        assert_eq!(parsed.bytes, b"hello");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(DataUri::parse("https://example.com/a.png"), Err(DataUriError::NotDataUri));
        assert_eq!(DataUri::parse("data:image/png;base64"), Err(DataUriError::NotDataUri));
        assert_eq!(DataUri::parse("data:text/plain,hello"), Err(DataUriError::NotBase64));
        assert!(matches!(DataUri::parse("data:image/png;base64,@@@"), Err(DataUriError::Payload(_))));
    }
}
