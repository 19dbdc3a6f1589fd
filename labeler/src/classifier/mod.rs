pub mod rekognition;

use async_trait::async_trait;
use frame_labeler_common::frame::EncodedImage;
use frame_labeler_common::label::{Label, MAX_LABELS, MIN_CONFIDENCE};

pub use rekognition::RekognitionClassifier;

/// One labeling request. The limits are fixed; only the image varies.
#[derive(Debug, Clone)]
pub struct DetectRequest {
    pub image_bytes: Vec<u8>,
    pub max_labels: i32,
    pub min_confidence: f32,
}

impl DetectRequest {
    pub fn new(image: EncodedImage) -> Self {
        Self {
            image_bytes: image.into_bytes(),
            max_labels: MAX_LABELS,
            min_confidence: MIN_CONFIDENCE,
        }
    }
}

/// Remote image-labeling capability.
///
/// Returns the labels as the service sent them: already filtered by
/// `min_confidence` and capped at `max_labels`, in no particular order.
#[async_trait]
pub trait LabelClassifier: Send + Sync {
    async fn detect_labels(&self, request: DetectRequest) -> Result<Vec<Label>, ClassificationError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassificationError {
    /// The service call failed; the message carries the service error code.
    #[error("{0}")]
    Remote(String),
}

impl ClassificationError {
    pub fn message(&self) -> &str {
        match self {
            Self::Remote(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_fixed_limits() {
        let image = EncodedImage {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 2,
            height: 2,
            captured_at_ms: 0,
        };
        let request = DetectRequest::new(image);
        assert_eq!(request.max_labels, 10);
        assert_eq!(request.min_confidence, 70.0);
        assert_eq!(request.image_bytes, vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn error_message_is_verbatim() {
        let err = ClassificationError::Remote("ThrottlingException: Rate exceeded".into());
        assert_eq!(err.message(), "ThrottlingException: Rate exceeded");
        assert_eq!(err.to_string(), "ThrottlingException: Rate exceeded");
    }
}
