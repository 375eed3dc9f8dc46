//! Data-URL encoding for thumbnails.
//!
//! The host expects thumbnails inline as `data:<mime>;base64,<payload>` with
//! standard (padded) base64.

use base64::{Engine, engine::general_purpose};

/// Encode bytes as a data URL.
///
/// # Example
/// ```
/// use dropfs::base64::data_url;
/// let url = data_url("image/jpeg", b"hi");
/// assert_eq!(url, "data:image/jpeg;base64,aGk=");
/// ```
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(data)
    )
}

/// Split a base64 data URL into its mime type and decoded bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Result<Vec<u8>, base64::DecodeError>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    Some((
        mime_type.to_string(),
        general_purpose::STANDARD.decode(payload),
    ))
}
