mod classifier;
mod display;
mod pipeline;
mod scheduler;
mod source;

use classifier::RekognitionClassifier;
use display::{ConsoleDisplay, DisplayBoard};
use frame_labeler_common::config::Config;
use pipeline::{Pipeline, SetupError};
use scheduler::CaptureScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        mode = %config.source.mode,
        interval_ms = config.capture.interval_ms,
        region = %config.rekognition.region,
        console = config.display.console,
        http_addr = config.display.http_addr.as_deref().unwrap_or("disabled"),
        "starting frame-labeler"
    );

    let pipeline = match build_pipeline(&config).await {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(error = %e, "failed to set up capture pipeline");
            std::process::exit(1);
        }
    };

    let scheduler = CaptureScheduler::new(
        pipeline.source(),
        Duration::from_millis(config.capture.interval_ms),
    );
    let cycles = move |cycle| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            pipeline.run_cycle(cycle).await;
        }
    };

    tokio::select! {
        result = scheduler.run(cycles) => {
            if let Err(e) = result {
                error!(error = %e, "video source failed before capture started");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
}

/// Wire the configured source, classifier and sinks together.
async fn build_pipeline(config: &Config) -> Result<Pipeline, SetupError> {
    let mut builder = Pipeline::builder()
        .jpeg_quality(config.capture.jpeg_quality)
        .watch(config.labels.watch.clone());

    if let Some(source) = source::from_config(&config.source)? {
        builder = builder.source(source);
    }

    if config.display.console {
        let console = Arc::new(ConsoleDisplay::stdout());
        builder = builder.status_sink(console.clone()).table_sink(console);
    }

    if let Some(addr) = &config.display.http_addr {
        let listener = display::http::bind(addr).await?;
        let board = Arc::new(DisplayBoard::new());
        builder = builder.status_sink(board.clone()).table_sink(board.clone());
        tokio::spawn(async move {
            if let Err(e) = display::http::serve(listener, board).await {
                error!(error = %e, "display HTTP server stopped");
            }
        });
    }

    let classifier = Arc::new(RekognitionClassifier::new(&config.rekognition).await);
    builder.classifier(classifier).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn taken_display_port_fails_setup() {
        let image_path = std::env::temp_dir().join(format!("frame-labeler-{}.png", std::process::id()));
        RgbImage::from_pixel(8, 8, Rgb([0, 128, 255])).save(&image_path).unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();

        let config = Config::parse(&format!(
            r#"
            [source]
            mode = "file"
            path = "{}"

            [display]
            console = false
            http_addr = "{}"
            "#,
            image_path.display(),
            taken.local_addr().unwrap()
        ))
        .unwrap();

        let result = build_pipeline(&config).await;
        let _ = std::fs::remove_file(&image_path);
        assert!(matches!(result, Err(SetupError::Display(_))));
    }
}
