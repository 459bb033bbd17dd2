use bytes::Bytes;

use crate::error::{Error, Result};

// =============================================================================
// Classification Request
// =============================================================================

/// A single classification request.
///
/// Constructed per user action (one photo or one free-text entry), passed
/// once into the gateway, and discarded after the result is produced.
#[derive(Debug, Clone)]
pub enum ClassificationRequest {
    /// A photo of a suspected civic issue.
    Image {
        /// Raw image bytes.
        bytes: Bytes,
        /// MIME type, e.g. `image/jpeg`.
        mime_type: String,
    },

    /// A free-text description of an issue.
    Text {
        /// Non-empty description text.
        text: String,
    },
}

impl ClassificationRequest {
    /// Create an image request.
    pub fn image(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create a text request. Text must be non-empty after trimming.
    pub fn text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::invalid_request("description text is empty"));
        }
        Ok(Self::Text { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_request_rejects_empty_input() {
        assert!(matches!(
            ClassificationRequest::text(""),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            ClassificationRequest::text("   \n\t"),
            Err(Error::InvalidRequest(_))
        ));
        assert!(ClassificationRequest::text("pothole on 5th St").is_ok());
    }

    #[test]
    fn image_request_keeps_payload() {
        let request = ClassificationRequest::image(vec![1u8, 2, 3], "image/jpeg");
        match request {
            ClassificationRequest::Image { bytes, mime_type } => {
                assert_eq!(bytes.as_ref(), &[1, 2, 3]);
                assert_eq!(mime_type, "image/jpeg");
            }
            ClassificationRequest::Text { .. } => panic!("expected image variant"),
        }
    }
}
