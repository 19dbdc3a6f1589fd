use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use frame_labeler_common::frame::Frame;
use futures_util::StreamExt;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{SourceError, VideoSource};

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Most recent JPEG received from the camera.
#[derive(Debug, Clone)]
struct LatestJpeg {
    jpeg: Bytes,
    received_at_ms: i64,
}

/// An MJPEG camera served as `multipart/x-mixed-replace` over HTTP.
///
/// `ready` opens the connection, hands it to a background reader that keeps
/// only the newest JPEG, and resolves once the first JPEG has arrived.
/// Snapshots decode that JPEG on demand.
pub struct MjpegSource {
    url: String,
    client: reqwest::Client,
    latest: Arc<Mutex<Option<LatestJpeg>>>,
    /// Set by the reader when it stores its first JPEG.
    frame_tx: Arc<watch::Sender<bool>>,
    has_frame: watch::Receiver<bool>,
    reader_started: AtomicBool,
    playing: AtomicBool,
}

impl MjpegSource {
    pub fn new(url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(SourceError::HttpConnect)?;
        let (frame_tx, has_frame) = watch::channel(false);
        Ok(Self {
            url: url.to_string(),
            client,
            latest: Arc::new(Mutex::new(None)),
            frame_tx: Arc::new(frame_tx),
            has_frame,
            reader_started: AtomicBool::new(false),
            playing: AtomicBool::new(false),
        })
    }

    /// Spawn the stream reader once. `first` is a connection already opened.
    fn start_reader(&self, first: Option<reqwest::Response>) {
        if self.reader_started.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(run_reader(
            self.url.clone(),
            self.client.clone(),
            first,
            Arc::clone(&self.latest),
            Arc::clone(&self.frame_tx),
        ));
    }
}

#[async_trait]
impl VideoSource for MjpegSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn ready(&self) -> Result<(), SourceError> {
        if !self.reader_started.load(Ordering::Acquire) {
            let response = connect(&self.client, &self.url).await?;
            self.start_reader(Some(response));
        }

        let mut has_frame = self.has_frame.clone();
        if has_frame.wait_for(|has| *has).await.is_err() {
            return Err(SourceError::ReaderStopped);
        }
        debug!(url = %self.url, "first MJPEG frame buffered");
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn play(&self) -> Result<(), SourceError> {
        if self.playing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.start_reader(None);
        info!(url = %self.url, "MJPEG playback started");
        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        let latest = lock(&self.latest).clone()?;
        ImageReader::with_format(Cursor::new(&latest.jpeg[..]), ImageFormat::Jpeg)
            .into_dimensions()
            .ok()
    }

    fn snapshot(&self) -> Option<Frame> {
        let latest = lock(&self.latest).clone()?;
        let rgb = match image::load_from_memory_with_format(&latest.jpeg, ImageFormat::Jpeg) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!(error = %e, bytes = latest.jpeg.len(), "failed to decode latest MJPEG frame");
                return None;
            }
        };
        let (width, height) = rgb.dimensions();
        match Frame::new(width, height, rgb.into_raw(), latest.received_at_ms) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "decoded MJPEG frame does not fit its dimensions");
                None
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn connect(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, SourceError> {
    info!(url, "connecting to MJPEG stream");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(SourceError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus(response.status().as_u16()));
    }

    info!(status = %response.status(), "connected to MJPEG stream");
    Ok(response)
}

/// Keep the latest frame fresh for the lifetime of the process.
/// Reconnects with exponential backoff when the camera drops the stream.
async fn run_reader(
    url: String,
    client: reqwest::Client,
    mut pending: Option<reqwest::Response>,
    latest: Arc<Mutex<Option<LatestJpeg>>>,
    frame_tx: Arc<watch::Sender<bool>>,
) {
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);

    loop {
        let response = match pending.take() {
            Some(r) => Ok(r),
            None => connect(&client, &url).await,
        };
        match response {
            Ok(response) => match consume_stream(response, &latest, &frame_tx).await {
                Ok(()) => {
                    info!(url = %url, "stream ended cleanly, reconnecting");
                    backoff = Duration::from_secs(2);
                }
                Err(e) => {
                    error!(error = %e, url = %url, "stream error, reconnecting in {:?}", backoff);
                }
            },
            Err(e) => {
                error!(error = %e, url = %url, "failed to connect, retrying in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn consume_stream(
    response: reqwest::Response,
    latest: &Mutex<Option<LatestJpeg>>,
    frame_tx: &watch::Sender<bool>,
) -> Result<(), SourceError> {
    let boundary = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(boundary_from_content_type)
        .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());
    debug!(boundary = %boundary, "parsing multipart stream");

    let mut frames: u64 = 0;
    let mut parser = MjpegParser::new(&boundary);
    let mut byte_stream = response.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(SourceError::HttpStream)?;
        for jpeg in parser.push(&chunk) {
            frames += 1;
            if frames % 100 == 0 {
                debug!(frames, bytes = jpeg.len(), "MJPEG frames received");
            }
            *lock(latest) = Some(LatestJpeg {
                jpeg,
                received_at_ms: Utc::now().timestamp_millis(),
            });
            if !*frame_tx.borrow() {
                frame_tx.send_replace(true);
            }
        }
    }

    Ok(())
}

/// Extract the multipart boundary from a `Content-Type` header value.
fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').trim_start_matches("--").to_string())
        .filter(|b| !b.is_empty())
}

/// Parse state for the MJPEG multipart stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Looking for the boundary marker `--<boundary>\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for a multipart MJPEG body.
struct MjpegParser {
    boundary: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MjpegParser {
    fn new(boundary: &str) -> Self {
        Self {
            boundary: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed one network chunk; returns every JPEG completed by it.
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let boundary_len = self.boundary.len();
        let mut out = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.boundary) {
                        let _ = self.buffer.split_to(pos + boundary_len);
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep the tail in case the boundary spans chunks
                        if self.buffer.len() > boundary_len {
                            let _ = self.buffer.split_to(self.buffer.len() - boundary_len);
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    let found = find_subsequence(&self.buffer[self.jpeg_start..], &self.boundary);
                    if let Some(pos) = found {
                        let jpeg_end = self.jpeg_start + pos;
                        // Strip trailing \r\n before boundary
                        let end = if jpeg_end >= 2
                            && self.buffer[jpeg_end - 2] == b'\r'
                            && self.buffer[jpeg_end - 1] == b'\n'
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };

                        let jpeg = self.buffer.split_to(end).freeze();
                        let _ = self.buffer.split_to(jpeg_end - end + boundary_len);

                        if !jpeg.is_empty() {
                            out.push(jpeg);
                        }
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Avoid re-scanning old data on the next chunk
                        self.jpeg_start = self.buffer.len().saturating_sub(boundary_len);
                        break;
                    }
                }
            }
        }

        out
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
