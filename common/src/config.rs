use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// JPEG quality used when `capture.jpeg_quality` is not set.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub rekognition: RekognitionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// "mjpeg" for an HTTP multipart camera stream, "file" for a still image.
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RekognitionConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the service URL, e.g. for a local mock.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_console")]
    pub console: bool,
    /// Bind address for the JSON status server; disabled when absent.
    #[serde(default)]
    pub http_addr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelsConfig {
    #[serde(default)]
    pub watch: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for RekognitionConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            console: default_console(),
            http_addr: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.capture.interval_ms == 0 {
            return Err(ConfigError::Invalid("capture.interval_ms must be > 0".into()));
        }
        if !(1..=100).contains(&config.capture.jpeg_quality) {
            return Err(ConfigError::Invalid(
                "capture.jpeg_quality must be within 1..=100".into(),
            ));
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_mode() -> String {
    "mjpeg".into()
}
fn default_interval_ms() -> u64 {
    3000
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}
fn default_region() -> String {
    "us-west-2".into()
}
fn default_console() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [source]
            url = "http://camera.local:8080/stream"
            "#,
        )
        .unwrap();
        assert_eq!(config.source.mode, "mjpeg");
        assert_eq!(config.capture.interval_ms, 3000);
        assert_eq!(config.capture.jpeg_quality, 80);
        assert_eq!(config.rekognition.region, "us-west-2");
        assert!(config.display.console);
        assert!(config.display.http_addr.is_none());
        assert!(config.labels.watch.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_config() {
        let config = Config::parse(
            r#"
            [source]
            mode = "file"
            path = "fixtures/dog.jpg"

            [capture]
            interval_ms = 10000
            jpeg_quality = 90

            [rekognition]
            region = "eu-west-1"
            endpoint = "http://localhost:4566"

            [display]
            console = false
            http_addr = "127.0.0.1:8090"

            [labels]
            watch = ["Dog", "Cat"]
            "#,
        )
        .unwrap();
        assert_eq!(config.source.mode, "file");
        assert_eq!(config.source.path.as_deref(), Some("fixtures/dog.jpg"));
        assert_eq!(config.capture.interval_ms, 10000);
        assert_eq!(config.rekognition.endpoint.as_deref(), Some("http://localhost:4566"));
        assert!(!config.display.console);
        assert_eq!(config.labels.watch, vec!["Dog", "Cat"]);
    }

    #[test]
    fn zero_interval_rejected() {
        let result = Config::parse(
            r#"
            [source]
            url = "http://camera.local/stream"
            [capture]
            interval_ms = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_source_section_is_parse_error() {
        let result = Config::parse("[capture]\ninterval_ms = 1000\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file() {
        let result = Config::load(Path::new("/nonexistent/frame-labeler.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile(..))));
    }
}
