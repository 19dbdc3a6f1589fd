pub mod mjpeg;
pub mod still;

use async_trait::async_trait;
use frame_labeler_common::config::SourceConfig;
use frame_labeler_common::frame::Frame;
use std::path::Path;
use std::sync::Arc;

pub use mjpeg::MjpegSource;
pub use still::StillImageSource;

/// A live video feed the scheduler captures from.
///
/// Implementations must be cheap to snapshot: `snapshot` runs on the
/// scheduler's tick path and only copies the most recent picture.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Resolves once the source can start playing.
    async fn ready(&self) -> Result<(), SourceError>;

    fn is_playing(&self) -> bool;

    /// Begin playback. Calling it on a playing source is a no-op.
    fn play(&self) -> Result<(), SourceError>;

    /// Native resolution of the current picture, if one has arrived yet.
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Copy the current picture into a pixel buffer at native resolution.
    fn snapshot(&self) -> Option<Frame>;
}

/// Build the configured source. `Ok(None)` means nothing usable was configured.
pub fn from_config(config: &SourceConfig) -> Result<Option<Arc<dyn VideoSource>>, SourceError> {
    match config.mode.as_str() {
        "mjpeg" => match config.url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let source = MjpegSource::new(url)?;
                Ok(Some(Arc::new(source) as Arc<dyn VideoSource>))
            }
            None => Ok(None),
        },
        "file" => match config.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                let source = StillImageSource::open(Path::new(path))?;
                Ok(Some(Arc::new(source) as Arc<dyn VideoSource>))
            }
            None => Ok(None),
        },
        other => Err(SourceError::UnknownMode(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown source mode '{0}', expected 'mjpeg' or 'file'")]
    UnknownMode(String),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("stream reader stopped before the first frame")]
    ReaderStopped,
    #[error("failed to load image {0}: {1}")]
    Image(String, image::ImageError),
}
