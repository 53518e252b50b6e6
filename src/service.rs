//! Survey service: creation, submission and analytics.
//!
//! All state lives in one in-memory [`SurveyDb`] guarded by a
//! [`RwLock`]. Mutations hold the write lock across append and flush, so
//! concurrent submissions are serialized and none is lost. Reads take the
//! read lock and clone what they need, so analytics always see a
//! consistent snapshot.

use crate::analysis::summarize_survey;
use crate::classifier::{enrich_submission, EmotionClassifier};
use crate::error::ServiceError;
use crate::models::{generate_survey_id, AnalyticsSummary, Answer, NewSurvey, ResponseSet, Survey};
use crate::store::blob::{blob_key, BlobStore, RESPONSES_PREFIX};
use crate::store::{SurveyDb, SurveyStore};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SurveyService {
    db: RwLock<SurveyDb>,
    store: Arc<dyn SurveyStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    classifier: Option<Arc<EmotionClassifier>>,
}

impl SurveyService {
    /// Create a service over `store`, loading its current state.
    pub fn new(store: Arc<dyn SurveyStore>) -> Result<Self, ServiceError> {
        let db = store.load()?;
        info!(
            "Loaded {} surveys, {} submissions",
            db.surveys.len(),
            db.responses.values().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            db: RwLock::new(db),
            store,
            blobs: None,
            classifier: None,
        })
    }

    /// Archive submissions and serve uploaded files from `blobs`.
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Classify free-text answers after each submission.
    pub fn with_classifier(mut self, classifier: Arc<EmotionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn blob_store(&self) -> Option<&Arc<dyn BlobStore>> {
        self.blobs.as_ref()
    }

    pub async fn create_survey(&self, new_survey: NewSurvey) -> Result<Survey, ServiceError> {
        let mut db = self.db.write().await;

        let mut id = generate_survey_id();
        while db.surveys.contains_key(&id) {
            id = generate_survey_id();
        }

        let survey = Survey {
            id: id.clone(),
            title: new_survey.title,
            questions: new_survey.questions,
            created_at: Utc::now(),
        };

        db.surveys.insert(id.clone(), survey.clone());
        db.responses.insert(id.clone(), Vec::new());

        if let Err(e) = self.flush(&db).await {
            db.surveys.remove(&id);
            db.responses.remove(&id);
            return Err(e);
        }

        info!(
            "Created survey {} ({} questions)",
            id,
            survey.questions.len()
        );
        Ok(survey)
    }

    /// Write `db` through the store on the blocking pool.
    async fn flush(&self, db: &SurveyDb) -> Result<(), ServiceError> {
        let store = self.store.clone();
        let snapshot = db.clone();
        run_blocking(move || store.save(&snapshot)).await
    }

    pub async fn get_survey(&self, id: &str) -> Result<Survey, ServiceError> {
        self.db
            .read()
            .await
            .surveys
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Record one submission. The answers are stored as given; nothing
    /// checks them against the survey's questions.
    pub async fn submit_response(
        &self,
        id: &str,
        answers: Vec<Answer>,
    ) -> Result<ResponseSet, ServiceError> {
        let mut db = self.db.write().await;
        let survey = db.surveys.get(id).cloned().ok_or_else(|| not_found(id))?;

        let response = ResponseSet::new(answers);
        let submission_id = Uuid::new_v4().simple().to_string();

        let mut archived = None;
        if let Some(blobs) = &self.blobs {
            let key = blob_key(RESPONSES_PREFIX, &format!("{}-{}.json", id, submission_id))?;
            let record = json!({
                "survey_id": id,
                "answers": &response.answers,
                "submitted_at": response.submitted_at,
            });
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| ServiceError::Upstream(e.to_string()))?;
            let store = blobs.clone();
            let put_key = key.clone();
            run_blocking(move || store.put(&put_key, &bytes)).await?;
            archived = Some((blobs.clone(), key));
        }

        db.responses
            .entry(id.to_string())
            .or_default()
            .push(response.clone());

        if let Err(e) = self.flush(&db).await {
            if let Some(list) = db.responses.get_mut(id) {
                list.pop();
            }
            if let Some((blobs, key)) = archived {
                let delete_key = key.clone();
                if let Err(cleanup) = run_blocking(move || blobs.delete(&delete_key)).await {
                    warn!("Failed to remove archived submission {}: {}", key, cleanup);
                }
            }
            return Err(e);
        }
        drop(db);

        debug!(
            "Recorded submission {} for survey {} ({} answers)",
            submission_id,
            id,
            response.answers.len()
        );

        if let Some(classifier) = &self.classifier {
            tokio::spawn(enrich_submission(
                classifier.clone(),
                self.blobs.clone(),
                survey,
                response.clone(),
                submission_id,
            ));
        }

        Ok(response)
    }

    /// Survey plus a snapshot of its responses.
    pub async fn snapshot(&self, id: &str) -> Result<(Survey, Vec<ResponseSet>), ServiceError> {
        let db = self.db.read().await;
        let survey = db.surveys.get(id).cloned().ok_or_else(|| not_found(id))?;
        Ok((survey, db.responses_for(id).to_vec()))
    }

    pub async fn analytics(&self, id: &str) -> Result<AnalyticsSummary, ServiceError> {
        let (survey, responses) = self.snapshot(id).await?;
        Ok(summarize_survey(&survey, &responses))
    }
}

async fn run_blocking<F>(task: F) -> Result<(), ServiceError>
where
    F: FnOnce() -> Result<(), ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Persistence(format!("storage task failed: {}", e)))?
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("survey {}", id))
}
