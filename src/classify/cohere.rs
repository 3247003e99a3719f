//! Cohere classify endpoint over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{Classification, Classifier, ClassifyExample};
use crate::config::ClassifierConfig;
use crate::error::ClassifyError;

const PROVIDER: &str = "cohere";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error bodies are cut to this many bytes before they reach the logs.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a [String],
    examples: &'a [ClassifyExample],
    truncate: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    classifications: Vec<ApiClassification>,
}

#[derive(Debug, Deserialize)]
struct ApiClassification {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    prediction: Option<String>,
    /// Multi-label responses carry predictions here instead.
    #[serde(default)]
    predictions: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

impl ApiClassification {
    fn into_classification(self) -> Option<Classification> {
        let prediction = self
            .prediction
            .or_else(|| self.predictions.into_iter().next())
            .filter(|p| !p.trim().is_empty())?;
        Some(Classification {
            input: self.input,
            prediction,
            confidence: self.confidence,
        })
    }
}

/// Classifier backed by Cohere's `/v1/classify`.
pub struct CohereClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: Option<String>,
    examples: Vec<ClassifyExample>,
    max_inputs: usize,
}

impl CohereClassifier {
    pub fn new(
        config: &ClassifierConfig,
        examples: Vec<ClassifyExample>,
    ) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifyError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            examples,
            max_inputs: config.max_inputs,
        })
    }
}

#[async_trait]
impl Classifier for CohereClassifier {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn max_inputs(&self) -> usize {
        self.max_inputs
    }

    async fn classify(&self, inputs: &[String]) -> Result<Vec<Classification>, ClassifyError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.max_inputs {
            return Err(ClassifyError::TooManyInputs {
                got: inputs.len(),
                max: self.max_inputs,
            });
        }

        let request = ClassifyRequest {
            inputs,
            examples: &self.examples,
            truncate: "END",
            model: self.model.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClassifyError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to read response body: {e}"),
            })?;
        let parsed: ClassifyResponse =
            serde_json::from_str(&body).map_err(|e| ClassifyError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        if parsed.classifications.len() != inputs.len() {
            return Err(ClassifyError::CountMismatch {
                provider: PROVIDER.to_string(),
                expected: inputs.len(),
                got: parsed.classifications.len(),
            });
        }

        let classifications = parsed
            .classifications
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                c.into_classification()
                    .ok_or_else(|| ClassifyError::InvalidResponse {
                        provider: PROVIDER.to_string(),
                        reason: format!("classification {i} has no prediction"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = classifications.len(), "Classified batch");
        Ok(classifications)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
