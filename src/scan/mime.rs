//! MIME type resolution for images sent to the analysis service

use super::types::ScanRequest;

/// Used when neither the upload nor the bytes say otherwise
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Pick the MIME type to send along with an image.
///
/// Order: uploader hint, filename extension, magic bytes, `image/jpeg`.
pub fn resolve_mime(request: &ScanRequest) -> String {
    if let Some(hint) = request
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|h| h.starts_with("image/"))
    {
        return hint.to_string();
    }

    if let Some(guess) = mime_guess::from_path(&request.filename)
        .iter()
        .find(|m| m.type_() == mime_guess::mime::IMAGE)
    {
        return guess.essence_str().to_string();
    }

    detect_image_mime(&request.data)
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

/// Detect image MIME type from magic bytes
pub fn detect_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
        Some("image/webp")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else {
        None
    }
}
