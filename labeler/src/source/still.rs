use async_trait::async_trait;
use chrono::Utc;
use frame_labeler_common::frame::Frame;
use image::RgbImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::{SourceError, VideoSource};

/// A single image file played as a frozen feed. Useful for offline runs.
pub struct StillImageSource {
    name: String,
    image: RgbImage,
    playing: AtomicBool,
}

impl StillImageSource {
    /// Decode the image up front so a bad path fails at startup.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let image = image::open(path)
            .map_err(|e| SourceError::Image(path.display().to_string(), e))?
            .to_rgb8();
        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "loaded still image source"
        );
        Ok(Self::from_image(path.display().to_string(), image))
    }

    pub fn from_image(name: impl Into<String>, image: RgbImage) -> Self {
        Self {
            name: name.into(),
            image,
            playing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl VideoSource for StillImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ready(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn play(&self) -> Result<(), SourceError> {
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        Some(self.image.dimensions())
    }

    fn snapshot(&self) -> Option<Frame> {
        let (width, height) = self.image.dimensions();
        match Frame::new(width, height, self.image.as_raw().clone(), Utc::now().timestamp_millis()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, source = %self.name, "still image does not fit its dimensions");
                None
            }
        }
    }
}
