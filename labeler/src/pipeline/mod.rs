pub mod encoder;

use frame_labeler_common::config::DEFAULT_JPEG_QUALITY;
use frame_labeler_common::frame::CycleId;
use frame_labeler_common::label::{rank_labels, RankedLabelSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::classifier::{ClassificationError, DetectRequest, LabelClassifier};
use crate::display::{Display, StatusSink, TableSink};
use crate::source::{SourceError, VideoSource};

use encoder::{encode_jpeg, EncodeError};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("video source error: {0}")]
    Source(#[from] SourceError),
    #[error("display HTTP server: {0}")]
    Display(#[from] std::io::Error),
}

/// Why a cycle ended without showing labels.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Encoding(#[from] EncodeError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

/// What one cycle left on the display.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Labels shown with a success status.
    Displayed(RankedLabelSet),
    /// The remote call failed; the status shows the message.
    Failed(ClassificationError),
    /// No image to send; the display was not touched.
    Aborted(EncodeError),
    /// A newer cycle's result was already on display.
    Stale,
}

/// capture → encode → classify → display for one cycle.
pub struct Pipeline {
    source: Arc<dyn VideoSource>,
    classifier: Arc<dyn LabelClassifier>,
    display: Display,
    jpeg_quality: u8,
    watch: Vec<String>,
}

#[derive(Default)]
pub struct PipelineBuilder {
    source: Option<Arc<dyn VideoSource>>,
    classifier: Option<Arc<dyn LabelClassifier>>,
    status_sinks: Vec<Arc<dyn StatusSink>>,
    table_sinks: Vec<Arc<dyn TableSink>>,
    jpeg_quality: Option<u8>,
    watch: Vec<String>,
}

impl PipelineBuilder {
    pub fn source(mut self, source: Arc<dyn VideoSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn LabelClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sinks.push(sink);
        self
    }

    pub fn table_sink(mut self, sink: Arc<dyn TableSink>) -> Self {
        self.table_sinks.push(sink);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    /// Label names that get an info event whenever they are displayed.
    pub fn watch(mut self, names: Vec<String>) -> Self {
        self.watch = names;
        self
    }

    pub fn build(self) -> Result<Pipeline, SetupError> {
        let source = self
            .source
            .ok_or(SetupError::MissingCollaborator("video source"))?;
        let classifier = self
            .classifier
            .ok_or(SetupError::MissingCollaborator("label classifier"))?;
        if self.status_sinks.is_empty() {
            return Err(SetupError::MissingCollaborator("status sink"));
        }
        if self.table_sinks.is_empty() {
            return Err(SetupError::MissingCollaborator("table sink"));
        }

        Ok(Pipeline {
            source,
            classifier,
            display: Display::new(self.status_sinks, self.table_sinks),
            jpeg_quality: self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            watch: self.watch,
        })
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn source(&self) -> Arc<dyn VideoSource> {
        Arc::clone(&self.source)
    }

    /// Run one cycle to completion. Errors end this cycle only.
    pub async fn run_cycle(&self, cycle: CycleId) -> CycleOutcome {
        match self.classify_frame(cycle).await {
            Ok(ranked) => {
                info!(
                    %cycle,
                    labels = ?ranked.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
                    classifier = self.classifier.name(),
                    "detection complete"
                );
                for label in ranked.matching(&self.watch) {
                    info!(
                        %cycle,
                        label = %label.name,
                        confidence = %label.confidence_text(),
                        "watched label detected"
                    );
                }
                if self.display.show_labels(cycle, &ranked) {
                    CycleOutcome::Displayed(ranked)
                } else {
                    CycleOutcome::Stale
                }
            }
            Err(CycleError::Classification(e)) => {
                error!(%cycle, error = %e, classifier = self.classifier.name(), "error detecting labels");
                if self.display.show_error(cycle, e.message()) {
                    CycleOutcome::Failed(e)
                } else {
                    CycleOutcome::Stale
                }
            }
            Err(CycleError::Encoding(e)) => {
                error!(%cycle, error = %e, source = self.source.name(), "failed to encode frame, skipping cycle");
                CycleOutcome::Aborted(e)
            }
        }
    }

    async fn classify_frame(&self, cycle: CycleId) -> Result<RankedLabelSet, CycleError> {
        // Sources may decode on snapshot, so keep it off the runtime workers.
        let source = Arc::clone(&self.source);
        let frame = tokio::task::spawn_blocking(move || source.snapshot())
            .await
            .map_err(|e| EncodeError::Join(e.to_string()))?
            .ok_or(EncodeError::NoFrame)?;
        let encoded = encode_jpeg(frame, self.jpeg_quality).await?;
        debug!(
            %cycle,
            bytes = encoded.len(),
            width = encoded.width,
            height = encoded.height,
            "submitting frame for labeling"
        );

        let labels = self
            .classifier
            .detect_labels(DetectRequest::new(encoded))
            .await?;
        Ok(rank_labels(labels))
    }
}
