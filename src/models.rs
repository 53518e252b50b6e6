//! Data models for the survey service.
//!
//! Surveys own an ordered list of typed questions. Submissions are stored as
//! [`ResponseSet`]s whose answers line up with the questions by position:
//! answer `i` belongs to question `i`. There is no per-question id, so
//! reordering a survey's questions would re-target every stored answer.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Length of generated survey ids.
pub const SURVEY_ID_LEN: usize = 10;

/// Title used when a survey is created without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Label substituted for a missing or blank multiple-choice option.
pub const DEFAULT_OPTION_LABEL: &str = "Option";

/// Scale bounds used when a scale question omits them.
pub const DEFAULT_SCALE_MIN: i64 = 1;
pub const DEFAULT_SCALE_MAX: i64 = 5;

/// Upper bound on the number of values a scale question may span.
pub const MAX_SCALE_BINS: i64 = 10_000;

/// Kind of a question. Determines the answer shape and the tally applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    Scale,
    FreeText,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "Multiple choice"),
            QuestionKind::Scale => write!(f, "Scale"),
            QuestionKind::FreeText => write!(f, "Free text"),
        }
    }
}

/// A single question in a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Display label.
    #[serde(default)]
    pub text: String,
    /// Kind of question.
    pub kind: QuestionKind,
    /// Option labels (multiple choice only). Duplicates are kept as-is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Option<String>>,
    /// Lower scale bound, inclusive (scale only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    /// Upper scale bound, inclusive (scale only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl Question {
    /// Creates a multiple-choice question.
    #[cfg(test)]
    pub fn multiple_choice(text: &str, options: &[&str]) -> Self {
        Self {
            text: text.to_string(),
            kind: QuestionKind::MultipleChoice,
            options: options.iter().map(|o| Some(o.to_string())).collect(),
            min: None,
            max: None,
        }
    }

    /// Creates a scale question over `[min, max]`.
    #[cfg(test)]
    pub fn scale(text: &str, min: i64, max: i64) -> Self {
        Self {
            text: text.to_string(),
            kind: QuestionKind::Scale,
            options: Vec::new(),
            min: Some(min),
            max: Some(max),
        }
    }

    /// Creates a free-text question.
    #[cfg(test)]
    pub fn free_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            kind: QuestionKind::FreeText,
            options: Vec::new(),
            min: None,
            max: None,
        }
    }

    /// Option labels as tallied: trimmed, with blanks replaced by "Option".
    pub fn option_labels(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|option| match option.as_deref().map(str::trim) {
                Some(label) if !label.is_empty() => label.to_string(),
                _ => DEFAULT_OPTION_LABEL.to_string(),
            })
            .collect()
    }

    /// Effective inclusive scale range.
    pub fn scale_range(&self) -> (i64, i64) {
        (
            self.min.unwrap_or(DEFAULT_SCALE_MIN),
            self.max.unwrap_or(DEFAULT_SCALE_MAX),
        )
    }

    /// Checks configuration that would make the question untallyable.
    pub fn validate(&self) -> Result<(), String> {
        if self.kind == QuestionKind::Scale {
            let (min, max) = self.scale_range();
            if min > max {
                return Err(format!(
                    "Scale question '{}' has min {} greater than max {}",
                    self.text, min, max
                ));
            }
            if max.saturating_sub(min).saturating_add(1) > MAX_SCALE_BINS {
                return Err(format!(
                    "Scale question '{}' spans more than {} values",
                    self.text, MAX_SCALE_BINS
                ));
            }
        }
        Ok(())
    }
}

/// A survey: a titled, ordered list of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating a survey.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSurvey {
    pub title: String,
    pub questions: Vec<Question>,
}

impl NewSurvey {
    /// Parses a `{title?, questions}` request body.
    ///
    /// `questions` must be an array; an empty array is a valid survey.
    pub fn from_json(body: &Value) -> Result<Self, ServiceError> {
        let questions = body
            .get("questions")
            .filter(|q| q.is_array())
            .ok_or_else(|| ServiceError::Validation("questions must be an array".to_string()))?;

        let questions: Vec<Question> = serde_json::from_value(questions.clone())
            .map_err(|e| ServiceError::Validation(format!("invalid question: {}", e)))?;

        for question in &questions {
            question.validate().map_err(ServiceError::Validation)?;
        }

        let title = body
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        Ok(Self { title, questions })
    }
}

/// Generates a short, URL-safe survey id.
pub fn generate_survey_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SURVEY_ID_LEN);
    id
}

/// One respondent's answer to the question at the same position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Answer {
    /// Raw answer value; its expected shape depends on the question kind.
    #[serde(default)]
    pub answer: Value,
}

impl Answer {
    pub fn new(answer: impl Into<Value>) -> Self {
        Self {
            answer: answer.into(),
        }
    }

    /// Builds an answer from one element of a submitted `answers` array.
    /// Elements that are not `{answer: ...}` objects become empty answers.
    pub fn from_element(element: &Value) -> Self {
        Self::new(element.get("answer").cloned().unwrap_or(Value::Null))
    }
}

/// Parses the `answers` array of a submission body.
///
/// The answers are not checked against the survey's questions; the
/// aggregator tolerates missing and mismatched answers.
pub fn parse_answers(body: &Value) -> Result<Vec<Answer>, ServiceError> {
    body.get("answers")
        .and_then(Value::as_array)
        .map(|answers| answers.iter().map(Answer::from_element).collect())
        .ok_or_else(|| ServiceError::Validation("answers must be an array".to_string()))
}

/// One submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSet {
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
}

impl ResponseSet {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers,
            submitted_at: Utc::now(),
        }
    }

    /// Answer value for the question at `index`, if one was given.
    pub fn answer_at(&self, index: usize) -> Option<&Value> {
        self.answers
            .get(index)
            .map(|a| &a.answer)
            .filter(|v| !v.is_null())
    }
}

/// Count of answers that landed on one scale value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleBin {
    pub label: String,
    pub count: usize,
}

/// Per-kind tally of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tally {
    MultipleChoice {
        labels: Vec<String>,
        counts: Vec<usize>,
        /// Answers given that matched no option.
        unmatched: usize,
    },
    Scale {
        bins: Vec<ScaleBin>,
        /// Answers given that were not an integer inside the range.
        unmatched: usize,
    },
    FreeText {
        count: usize,
    },
}

/// Analytics for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSummary {
    pub text: String,
    #[serde(flatten)]
    pub tally: Tally,
}

/// Analytics for a whole survey, one entry per question in question order.
pub type AnalyticsSummary = Vec<QuestionSummary>;
