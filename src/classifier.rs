//! Emotion classification of free-text answers.
//!
//! Classification is enrichment only: a submission is recorded before any
//! classification starts, and every failure here is logged and dropped.

use crate::error::ServiceError;
use crate::models::{QuestionKind, ResponseSet, Survey};
use crate::store::blob::{blob_key, BlobStore, RESULTS_PREFIX};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings for the classification API client.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_url: String,
    pub model: String,
    pub token: String,
    pub timeout_seconds: u64,
}

/// One label with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionLabel {
    pub label: String,
    pub score: f64,
}

/// Classification of one free-text answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRecord {
    pub survey_id: String,
    pub question_index: usize,
    pub text: String,
    pub labels: Vec<EmotionLabel>,
}

/// Client for a hosted text-classification model.
pub struct EmotionClassifier {
    config: ClassifierConfig,
    http_client: reqwest::Client,
}

impl EmotionClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Upstream(format!("failed to build HTTP client: {}", e)))?;

        info!("Emotion classifier enabled with model {}", config.model);

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Classify a single text.
    pub async fn classify(&self, text: &str) -> Result<Vec<EmotionLabel>, ServiceError> {
        let url = self.endpoint();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Upstream(format!(
                        "classification timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    ServiceError::Upstream(format!("cannot connect to {}", self.config.api_url))
                } else {
                    ServiceError::Upstream(format!("classification request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "classification API error {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("invalid classification response: {}", e)))?;

        Ok(parse_labels(&body))
    }
}

/// Extract labels from either `[{label, score}]` or the batched
/// `[[{label, score}]]` shape.
fn parse_labels(body: &Value) -> Vec<EmotionLabel> {
    let items = match body {
        Value::Array(outer) => match outer.first() {
            Some(Value::Array(inner)) => inner.as_slice(),
            _ => outer.as_slice(),
        },
        _ => &[],
    };

    let mut labels: Vec<EmotionLabel> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    labels.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    labels
}

/// Free-text answers worth classifying, as `(question index, text)`.
pub fn classifiable_answers(survey: &Survey, response: &ResponseSet) -> Vec<(usize, String)> {
    survey
        .questions
        .iter()
        .enumerate()
        .filter(|(_, q)| q.kind == QuestionKind::FreeText)
        .filter_map(|(index, _)| {
            response
                .answer_at(index)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| (index, text.to_string()))
        })
        .collect()
}

/// Classify the free-text answers of one submission and store the results
/// under `results/`. Never fails; problems are logged.
pub async fn enrich_submission(
    classifier: Arc<EmotionClassifier>,
    blobs: Option<Arc<dyn BlobStore>>,
    survey: Survey,
    response: ResponseSet,
    submission_id: String,
) {
    let answers = classifiable_answers(&survey, &response);
    if answers.is_empty() {
        return;
    }

    debug!(
        "Classifying {} answers for survey {}",
        answers.len(),
        survey.id
    );

    let calls = answers.iter().map(|(_, text)| classifier.classify(text));
    let outcomes = join_all(calls).await;

    let mut records = Vec::new();
    for ((question_index, text), outcome) in answers.into_iter().zip(outcomes) {
        match outcome {
            Ok(labels) => records.push(ClassificationRecord {
                survey_id: survey.id.clone(),
                question_index,
                text,
                labels,
            }),
            Err(e) => warn!(
                "Classification failed for survey {} question {}: {}",
                survey.id, question_index, e
            ),
        }
    }

    if records.is_empty() {
        return;
    }

    let Some(blobs) = blobs else {
        debug!("Classification results for {}: {:?}", survey.id, records);
        return;
    };

    let key = format!("{}-{}.json", survey.id, submission_id);
    let stored = tokio::task::spawn_blocking(move || {
        let key = blob_key(RESULTS_PREFIX, &key)?;
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| ServiceError::Upstream(e.to_string()))?;
        blobs.put(&key, &bytes)
    })
    .await
    .unwrap_or_else(|e| Err(ServiceError::Upstream(format!("storage task failed: {}", e))));

    if let Err(e) = stored {
        warn!("Failed to store classification results: {}", e);
    }
}
