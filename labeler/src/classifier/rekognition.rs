use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_rekognition::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_rekognition::operation::detect_labels::DetectLabelsOutput;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::Image;
use aws_types::region::Region;
use frame_labeler_common::config::RekognitionConfig;
use frame_labeler_common::label::Label;
use tracing::{debug, info, warn};

use super::{ClassificationError, DetectRequest, LabelClassifier};

/// Amazon Rekognition `DetectLabels` over the AWS SDK.
pub struct RekognitionClassifier {
    client: aws_sdk_rekognition::Client,
}

impl RekognitionClassifier {
    pub async fn new(config: &RekognitionConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        // Static keys win over the default provider chain when both are given.
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }

        let sdk_config = loader.load().await;
        info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "Rekognition client configured"
        );

        Self {
            client: aws_sdk_rekognition::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl LabelClassifier for RekognitionClassifier {
    async fn detect_labels(&self, request: DetectRequest) -> Result<Vec<Label>, ClassificationError> {
        let bytes = request.image_bytes.len();
        let image = Image::builder().bytes(Blob::new(request.image_bytes)).build();

        let output = self
            .client
            .detect_labels()
            .image(image)
            .max_labels(request.max_labels)
            .min_confidence(request.min_confidence)
            .send()
            .await
            .map_err(|e| ClassificationError::Remote(remote_message(&e)))?;

        let labels = labels_from_output(&output);
        debug!(bytes, labels = labels.len(), "DetectLabels returned");
        Ok(labels)
    }

    fn name(&self) -> &str {
        "rekognition"
    }
}

/// Keep the name and confidence of every label; the service's other
/// fields (instances, parents, categories) are not displayed.
fn labels_from_output(output: &DetectLabelsOutput) -> Vec<Label> {
    output
        .labels()
        .iter()
        .filter_map(|label| match (label.name(), label.confidence()) {
            (Some(name), Some(confidence)) => Some(Label::new(name, confidence)),
            _ => {
                warn!(?label, "label without name or confidence, skipping");
                None
            }
        })
        .collect()
}

/// Message shown on the status line: `Code: message` when the service
/// answered, the full error chain otherwise (e.g. connection refused).
fn remote_message<E>(err: &E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(err).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_rekognition::error::ErrorMetadata;
    use aws_sdk_rekognition::operation::detect_labels::DetectLabelsError;
    use aws_sdk_rekognition::types;

    #[test]
    fn converts_named_labels() {
        let output = DetectLabelsOutput::builder()
            .labels(types::Label::builder().name("Dog").confidence(97.25).build())
            .labels(types::Label::builder().name("Pet").confidence(88.0).build())
            .labels(types::Label::builder().confidence(99.0).build())
            .build();
        let labels = labels_from_output(&output);
        assert_eq!(labels, vec![Label::new("Dog", 97.25), Label::new("Pet", 88.0)]);
    }

    #[test]
    fn empty_output() {
        let output = DetectLabelsOutput::builder().build();
        assert!(labels_from_output(&output).is_empty());
    }

    #[test]
    fn message_carries_error_code() {
        let err = DetectLabelsError::generic(
            ErrorMetadata::builder()
                .code("ThrottlingException")
                .message("Rate exceeded")
                .build(),
        );
        assert_eq!(remote_message(&err), "ThrottlingException: Rate exceeded");
    }

    #[test]
    fn code_without_message() {
        let err = DetectLabelsError::generic(
            ErrorMetadata::builder().code("AccessDeniedException").build(),
        );
        assert_eq!(remote_message(&err), "AccessDeniedException");
    }
}
