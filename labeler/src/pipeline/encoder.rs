use frame_labeler_common::frame::{EncodedImage, Frame};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("video source has no frame yet")]
    NoFrame,
    #[error("frame has zero size ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("JPEG encoder produced no data")]
    Empty,
    #[error("JPEG encoding failed: {0}")]
    Jpeg(image::ImageError),
    #[error("encoder task failed: {0}")]
    Join(String),
}

/// Compress one frame as JPEG on the blocking pool.
pub async fn encode_jpeg(frame: Frame, quality: u8) -> Result<EncodedImage, EncodeError> {
    if frame.is_empty() {
        return Err(EncodeError::EmptyFrame {
            width: frame.width,
            height: frame.height,
        });
    }
    tokio::task::spawn_blocking(move || encode_blocking(frame, quality))
        .await
        .map_err(|e| EncodeError::Join(e.to_string()))?
}

fn encode_blocking(frame: Frame, quality: u8) -> Result<EncodedImage, EncodeError> {
    let mut jpeg = Vec::with_capacity(frame.rgb.len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(EncodeError::Jpeg)?;

    if jpeg.is_empty() {
        return Err(EncodeError::Empty);
    }

    debug!(
        width = frame.width,
        height = frame.height,
        quality,
        bytes = jpeg.len(),
        "frame encoded"
    );

    Ok(EncodedImage {
        jpeg,
        width: frame.width,
        height: frame.height,
        captured_at_ms: frame.captured_at_ms,
    })
}
