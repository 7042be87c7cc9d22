//! Image attachment encoding: PNG file → base64 data URI.
//!
//! The provider accepts images as `data:` URIs embedded in the JSON request
//! body. PNG is what the renderer writes — lossless, so rendered text stays
//! crisp for the vision model.

use crate::error::PdfmarkError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Read a rendered page image and wrap it as a `data:image/png;base64,…` URI.
pub fn encode_image(path: &Path) -> Result<String, PdfmarkError> {
    let bytes = std::fs::read(path).map_err(|e| {
        PdfmarkError::Internal(format!("read page image '{}': {e}", path.display()))
    })?;
    let b64 = STANDARD.encode(&bytes);
    debug!(image = %path.display(), bytes = b64.len(), "encoded page image");
    Ok(format!("data:image/png;base64,{b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_file_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page-0001.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n").expect("write");

        let uri = encode_image(&path).expect("encode");
        assert!(uri.starts_with("data:image/png;base64,"));

        let payload = uri.trim_start_matches("data:image/png;base64,");
        let decoded = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(encode_image(Path::new("/definitely/not/here.png")).is_err());
    }
}
