//! Size-capped reading of upstream response bodies

use reqwest::Response;

/// Read a response body, giving up once it grows past `max` bytes.
///
/// Returns `Ok(None)` when the declared or actual length exceeds `max`.
pub async fn read_limited(mut response: Response, max: usize) -> Result<Option<Vec<u8>>, reqwest::Error> {
    if response.content_length().is_some_and(|len| len > max as u64) {
        return Ok(None);
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > max {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body))
}
