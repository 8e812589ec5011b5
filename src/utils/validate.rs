//! Upload validation for comic images.
//!
//! Pure checks against a fixed allow-list; runs before any network call so a
//! bad upload never reaches the content store.

/// Maximum accepted image size (40 MiB).
pub const MAX_IMAGE_SIZE: u64 = 40 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/avif",
];

/// Validate an uploaded image by declared size and media type.
///
/// Returns `None` when the file is acceptable, otherwise a human-readable
/// error suitable for a 400 response.
pub fn validate_image_file(size: u64, content_type: &str) -> Option<String> {
    if size > MAX_IMAGE_SIZE {
        return Some("image exceeds maximum size of 40MB".to_string());
    }
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Some(format!(
            "image must be png, jpg, webp, gif, or avif. Got: {}",
            content_type
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_file_is_rejected_regardless_of_type() {
        for ty in ALLOWED_IMAGE_TYPES {
            assert!(validate_image_file(MAX_IMAGE_SIZE + 1, ty).is_some());
        }
        assert!(validate_image_file(MAX_IMAGE_SIZE + 1, "application/pdf").is_some());
    }

    #[test]
    fn disallowed_type_is_rejected_regardless_of_size() {
        for ty in ["image/tiff", "text/plain", "application/octet-stream", ""] {
            let err = validate_image_file(1, ty);
            assert!(err.is_some());
            assert!(err.unwrap().contains(ty));
        }
    }

    #[test]
    fn valid_size_and_type_pass() {
        assert_eq!(validate_image_file(0, "image/png"), None);
        assert_eq!(validate_image_file(MAX_IMAGE_SIZE, "image/avif"), None);
        assert_eq!(validate_image_file(1024, "image/webp"), None);
    }
}
