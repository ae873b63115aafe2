use serde::Deserialize;

use crate::error::DetectError;
use crate::models::detect_types::WasteCategory;

/// Fine-grained prediction from the remote classification endpoint.
/// `confidence` is the backend's percentage in 0-100, not a fraction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteClassification {
    pub predicted_class: String,
    pub waste_type: String,
    pub category: WasteCategory,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
struct ClassifyEnvelope {
    success: bool,
    result: Option<RemoteClassification>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
}

/// Client for the backend classification service: multipart image upload
/// against `/api/classify`, health probe against `/api/health`. The
/// backend is opaque; only its JSON envelope is interpreted here.
pub struct RemoteClassifier {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteClassifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Uploads one encoded image and returns the backend's prediction.
    /// A non-success envelope surfaces as `DetectError::Remote`.
    pub async fn classify(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteClassification, DetectError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(format!("{}/api/classify", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let envelope: ClassifyEnvelope = response.json().await?;
        parse_envelope(envelope)
    }

    pub async fn health(&self) -> Result<HealthStatus, DetectError> {
        let response = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await?;
        Ok(response.json().await?)
    }
}

fn parse_envelope(envelope: ClassifyEnvelope) -> Result<RemoteClassification, DetectError> {
    if !envelope.success {
        return Err(DetectError::Remote(
            envelope
                .error
                .unwrap_or_else(|| "backend reported an unknown error".to_string()),
        ));
    }
    envelope.result.ok_or_else(|| {
        DetectError::Remote("backend reported success without a result".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_parses_into_a_classification() {
        let envelope: ClassifyEnvelope = serde_json::from_str(
            r#"{
                "success": true,
                "result": {
                    "predicted_class": "Biological",
                    "waste_type": "Wet Waste",
                    "category": "wet",
                    "confidence": 97.42
                }
            }"#,
        )
        .unwrap();
        let result = parse_envelope(envelope).unwrap();
        assert_eq!(result.predicted_class, "Biological");
        assert_eq!(result.category, WasteCategory::Wet);
        assert!((result.confidence - 97.42).abs() < 1e-4);
    }

    #[test]
    fn ewaste_category_deserializes() {
        let envelope: ClassifyEnvelope = serde_json::from_str(
            r#"{
                "success": true,
                "result": {
                    "predicted_class": "Battery",
                    "waste_type": "E-Waste",
                    "category": "ewaste",
                    "confidence": 88.1
                }
            }"#,
        )
        .unwrap();
        assert_eq!(parse_envelope(envelope).unwrap().category, WasteCategory::Ewaste);
    }

    #[test]
    fn failure_envelope_surfaces_the_backend_error() {
        let envelope: ClassifyEnvelope =
            serde_json::from_str(r#"{"success": false, "error": "Model not loaded"}"#).unwrap();
        match parse_envelope(envelope) {
            Err(DetectError::Remote(msg)) => assert_eq!(msg, "Model not loaded"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn success_without_result_is_an_error() {
        let envelope: ClassifyEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(
            parse_envelope(envelope),
            Err(DetectError::Remote(_))
        ));
    }

    #[test]
    fn trailing_slashes_are_stripped_from_the_base_url() {
        let client = RemoteClassifier::new("http://localhost:5000//");
        assert_eq!(client.base_url, "http://localhost:5000");
    }

    #[test]
    fn health_payload_deserializes() {
        let health: HealthStatus = serde_json::from_str(
            r#"{"status": "online", "model_loaded": true, "timestamp": "2025-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(health.status, "online");
        assert!(health.model_loaded);
    }
}
