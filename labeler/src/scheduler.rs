use frame_labeler_common::frame::CycleId;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::source::{SourceError, VideoSource};

/// Fires one capture cycle per period once the video source is ready.
///
/// Cycles are spawned and never awaited here, so a slow remote call does not
/// delay the next tick. There is no stop handle: ticking lasts as long as the
/// runtime does.
pub struct CaptureScheduler {
    source: Arc<dyn VideoSource>,
    period: Duration,
}

impl CaptureScheduler {
    pub fn new(source: Arc<dyn VideoSource>, period: Duration) -> Self {
        Self { source, period }
    }

    /// Wait for the source, start playback if needed, then tick forever.
    ///
    /// Only returns on a readiness or playback failure.
    pub async fn run<F, Fut>(self, mut cycle: F) -> Result<Infallible, SourceError>
    where
        F: FnMut(CycleId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.source.ready().await?;
        if !self.source.is_playing() {
            debug!(source = self.source.name(), "source ready but paused, starting playback");
            self.source.play()?;
        }

        info!(
            source = self.source.name(),
            resolution = ?self.source.resolution(),
            period_ms = self.period.as_millis() as u64,
            "capture scheduler started"
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut id = CycleId(0);

        loop {
            ticker.tick().await;
            id = id.next();
            debug!(cycle = %id, "capture tick");
            tokio::spawn(cycle(id));
        }
    }
}
