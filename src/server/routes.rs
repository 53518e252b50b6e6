//! Request handlers. Each one maps a request onto [`SurveyService`]
//! and its result onto a response.
//!
//! [`SurveyService`]: crate::service::SurveyService

use super::AppState;
use crate::error::ServiceError;
use crate::models::{parse_answers, AnalyticsSummary, NewSurvey, Survey};
use crate::store::blob::{blob_key, BlobEntry, BlobStore, FILES_PREFIX, RESULTS_PREFIX};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

type JsonBody = Result<Json<Value>, JsonRejection>;

fn json_body(payload: JsonBody) -> Result<Value, ServiceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

fn blobs(state: &AppState) -> Result<&Arc<dyn BlobStore>, ServiceError> {
    state
        .blob_store()
        .ok_or_else(|| ServiceError::NotFound("blob storage".to_string()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn create_survey(
    State(state): State<AppState>,
    payload: JsonBody,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let new_survey = NewSurvey::from_json(&json_body(payload)?)?;
    let survey = state.create_survey(new_survey).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": survey.id }))))
}

pub async fn get_survey(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Survey>, ServiceError> {
    state.get_survey(&id).await.map(Json)
}

pub async fn submit_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: JsonBody,
) -> Result<Json<Value>, ServiceError> {
    // Unknown survey takes precedence over a malformed body.
    state.get_survey(&id).await?;
    let answers = parse_answers(&json_body(payload)?)?;
    state.submit_response(&id, answers).await?;

    Ok(Json(json!({ "ok": true })))
}

pub async fn analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalyticsSummary>, ServiceError> {
    state.analytics(&id).await.map(Json)
}

pub async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<Vec<BlobEntry>>, ServiceError> {
    blobs(&state)?.list(FILES_PREFIX).map(Json)
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let key = blob_key(FILES_PREFIX, &name)?;
    blobs(&state)?.put(&key, &body)?;

    Ok(Json(json!({ "ok": true, "key": key })))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let key = blob_key(FILES_PREFIX, &name)?;
    let bytes = blobs(&state)?.get(&key)?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let key = blob_key(FILES_PREFIX, &name)?;
    blobs(&state)?.delete(&key)?;

    Ok(Json(json!({ "ok": true })))
}

pub async fn list_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<BlobEntry>>, ServiceError> {
    blobs(&state)?.list(RESULTS_PREFIX).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::SurveyService;
    use crate::store::{LocalBlobStore, MemoryStore};
    use tempfile::TempDir;

    fn state() -> AppState {
        Arc::new(SurveyService::new(Arc::new(MemoryStore)).unwrap())
    }

    fn body(value: Value) -> JsonBody {
        Ok(Json(value))
    }

    async fn create(state: &AppState, value: Value) -> String {
        let (status, Json(created)) = create_survey(State(state.clone()), body(value))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        created["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let Json(value) = health().await;
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_create_and_fetch_survey() {
        let state = state();
        let id = create(
            &state,
            json!({"questions": [{"kind": "multiple_choice", "text": "Pick", "options": ["a", "b"]}]}),
        )
        .await;

        let Json(survey) = get_survey(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(survey.id, id);
        assert_eq!(survey.title, "Untitled");
        assert_eq!(survey.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_missing_questions() {
        let result = create_survey(State(state()), body(json!({"title": "T"}))).await;
        let err = result.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_survey_is_404() {
        let state = state();
        let err = get_survey(State(state.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = analytics(State(state.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        // Not-found wins over a malformed body.
        let err = submit_response(
            State(state.clone()),
            Path("nope".to_string()),
            body(json!({"answers": "bad"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_rejects_non_array_answers() {
        let state = state();
        let id = create(&state, json!({"questions": []})).await;

        let err = submit_response(State(state), Path(id), body(json!({"answers": {"a": 1}})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_end_to_end_analytics() {
        let state = state();
        let id = create(
            &state,
            json!({"title": "T", "questions": [{"kind": "scale", "min": 1, "max": 3, "text": "Q"}]}),
        )
        .await;

        for answer in [2, 2, 5] {
            let Json(ok) = submit_response(
                State(state.clone()),
                Path(id.clone()),
                body(json!({"answers": [{"answer": answer}]})),
            )
            .await
            .unwrap();
            assert_eq!(ok, json!({"ok": true}));
        }

        let Json(summary) = analytics(State(state), Path(id)).await.unwrap();
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            json!([{
                "text": "Q",
                "kind": "scale",
                "bins": [
                    {"label": "1", "count": 0},
                    {"label": "2", "count": 2},
                    {"label": "3", "count": 0}
                ],
                "unmatched": 1
            }])
        );
    }

    #[tokio::test]
    async fn test_files_unavailable_without_blob_store() {
        let err = list_files(State(state())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let state: AppState = Arc::new(
            SurveyService::new(Arc::new(MemoryStore))
                .unwrap()
                .with_blob_store(Arc::new(LocalBlobStore::new(dir.path()))),
        );

        let Json(stored) = upload_file(
            State(state.clone()),
            Path("notes.txt".to_string()),
            Bytes::from_static(b"hello"),
        )
        .await
        .unwrap();
        assert_eq!(stored["key"], json!("files/notes.txt"));

        let Json(listed) = list_files(State(state.clone())).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 5);

        delete_file(State(state.clone()), Path("notes.txt".to_string()))
            .await
            .unwrap();
        let err = delete_file(State(state.clone()), Path("notes.txt".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let Json(results) = list_results(State(state)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let state: AppState = Arc::new(
            SurveyService::new(Arc::new(MemoryStore))
                .unwrap()
                .with_blob_store(Arc::new(LocalBlobStore::new(dir.path()))),
        );

        let err = upload_file(State(state), Path("..".to_string()), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
