//! Per-question analytics over a survey's submissions.
//!
//! Every function here is a pure read of the response list: computing the
//! same survey twice without new submissions yields identical summaries.
//! Answers are looked up by question position. Missing answers are skipped,
//! and answers that cannot be tallied are dropped and counted as `unmatched`.

use crate::models::{
    AnalyticsSummary, Question, QuestionKind, QuestionSummary, ResponseSet, ScaleBin, Survey,
    Tally,
};
use serde_json::Value;

/// Summarize every question of a survey, preserving question order.
pub fn summarize_survey(survey: &Survey, responses: &[ResponseSet]) -> AnalyticsSummary {
    survey
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| summarize_question(index, question, responses))
        .collect()
}

/// Summarize the question at position `index`.
pub fn summarize_question(
    index: usize,
    question: &Question,
    responses: &[ResponseSet],
) -> QuestionSummary {
    let tally = match question.kind {
        QuestionKind::MultipleChoice => tally_multiple_choice(index, question, responses),
        QuestionKind::Scale => tally_scale(index, question, responses),
        QuestionKind::FreeText => tally_free_text(index, responses),
    };

    QuestionSummary {
        text: question.text.clone(),
        tally,
    }
}

/// Count answers per option label. Matching is exact and case-sensitive
/// after trimming; an answer matching a duplicated label counts toward the
/// first occurrence.
pub fn tally_multiple_choice(index: usize, question: &Question, responses: &[ResponseSet]) -> Tally {
    let labels = question.option_labels();
    let mut counts = vec![0; labels.len()];
    let mut unmatched = 0;

    for value in responses.iter().filter_map(|r| r.answer_at(index)) {
        let position = choice_text(value)
            .and_then(|text| labels.iter().position(|label| *label == text));

        match position {
            Some(i) => counts[i] += 1,
            None => unmatched += 1,
        }
    }

    Tally::MultipleChoice {
        labels,
        counts,
        unmatched,
    }
}

/// Count answers per integer in the question's inclusive range.
/// Out-of-range, fractional and non-numeric answers are dropped.
pub fn tally_scale(index: usize, question: &Question, responses: &[ResponseSet]) -> Tally {
    let (min, max) = question.scale_range();
    let mut bins: Vec<ScaleBin> = if min <= max {
        (min..=max)
            .map(|value| ScaleBin {
                label: value.to_string(),
                count: 0,
            })
            .collect()
    } else {
        Vec::new()
    };
    let mut unmatched = 0;

    for value in responses.iter().filter_map(|r| r.answer_at(index)) {
        match scale_value(value).and_then(|v| bin_index(v, min, bins.len())) {
            Some(i) => bins[i].count += 1,
            None => unmatched += 1,
        }
    }

    Tally::Scale { bins, unmatched }
}

/// Count non-empty answers.
pub fn tally_free_text(index: usize, responses: &[ResponseSet]) -> Tally {
    let count = responses
        .iter()
        .filter_map(|r| r.answer_at(index))
        .filter(|value| is_truthy(value))
        .count();

    Tally::FreeText { count }
}

/// Text of a multiple-choice answer, trimmed. Scalars are compared by their
/// JSON text so that a numeric answer can match a numeric label.
fn choice_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer value of a scale answer. Numeric strings are accepted;
/// fractional and non-numeric values are not.
fn scale_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None if n.is_u64() => None,
            None => n.as_f64().and_then(integral),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

/// Whole-valued floats within `i64` range.
fn integral(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

    if !value.is_finite() || value.fract() != 0.0 || value < -LIMIT || value >= LIMIT {
        return None;
    }
    Some(value as i64)
}

/// Bin offset of `value` in a range starting at `min` with `bins` entries.
fn bin_index(value: i64, min: i64, bins: usize) -> Option<usize> {
    let offset = usize::try_from(value.checked_sub(min)?).ok()?;
    (offset < bins).then_some(offset)
}

/// Whether an answer counts as given for free text.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Answer;
    use chrono::Utc;
    use serde_json::json;

    fn responses(rows: Vec<Vec<Value>>) -> Vec<ResponseSet> {
        rows.into_iter()
            .map(|row| ResponseSet::new(row.into_iter().map(Answer::new).collect()))
            .collect()
    }

    fn single(value: Value) -> Vec<ResponseSet> {
        responses(vec![vec![value]])
    }

    fn survey(questions: Vec<Question>) -> Survey {
        Survey {
            id: "abc".to_string(),
            title: "T".to_string(),
            questions,
            created_at: Utc::now(),
        }
    }

    fn mc_counts(tally: Tally) -> (Vec<String>, Vec<usize>, usize) {
        match tally {
            Tally::MultipleChoice {
                labels,
                counts,
                unmatched,
            } => (labels, counts, unmatched),
            other => panic!("expected multiple choice tally, got {:?}", other),
        }
    }

    fn scale_counts(tally: Tally) -> (Vec<ScaleBin>, usize) {
        match tally {
            Tally::Scale { bins, unmatched } => (bins, unmatched),
            other => panic!("expected scale tally, got {:?}", other),
        }
    }

    #[test]
    fn test_one_response_per_option() {
        let q = Question::multiple_choice("Color", &["Red", "Green", "Blue"]);
        let rs = responses(vec![
            vec![json!("Red")],
            vec![json!("Green")],
            vec![json!("Blue")],
        ]);

        let (labels, counts, unmatched) = mc_counts(tally_multiple_choice(0, &q, &rs));
        assert_eq!(labels, vec!["Red", "Green", "Blue"]);
        assert_eq!(counts, vec![1, 1, 1]);
        assert_eq!(counts.iter().sum::<usize>(), 3);
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn test_unmatched_choice_is_dropped() {
        let q = Question::multiple_choice("Color", &["Red", "Green"]);
        let rs = responses(vec![
            vec![json!("Purple")],
            vec![json!("   ")],
            vec![json!("")],
            vec![json!("red")],
            vec![json!("  Red  ")],
        ]);

        let (labels, counts, unmatched) = mc_counts(tally_multiple_choice(0, &q, &rs));
        assert_eq!(labels, vec!["Red", "Green"]);
        assert!(!labels.contains(&"Purple".to_string()));
        assert_eq!(counts, vec![1, 0]);
        assert_eq!(unmatched, 4);
    }

    #[test]
    fn test_missing_answers_are_skipped() {
        let q = Question::multiple_choice("Color", &["Red"]);
        let rs = responses(vec![vec![], vec![Value::Null], vec![json!("Red")]]);

        let (_, counts, unmatched) = mc_counts(tally_multiple_choice(0, &q, &rs));
        assert_eq!(counts, vec![1]);
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn test_blank_option_labels() {
        let q: Question = serde_json::from_value(json!({
            "text": "Q",
            "kind": "multiple_choice",
            "options": [" Yes ", "", null]
        }))
        .unwrap();
        let rs = single(json!("Option"));

        let (labels, counts, _) = mc_counts(tally_multiple_choice(0, &q, &rs));
        assert_eq!(labels, vec!["Yes", "Option", "Option"]);
        assert_eq!(counts, vec![0, 1, 0]);
    }

    #[test]
    fn test_numeric_choice_matches_numeric_label() {
        let q = Question::multiple_choice("How many", &["1", "2"]);
        let (_, counts, _) = mc_counts(tally_multiple_choice(0, &q, &single(json!(2))));
        assert_eq!(counts, vec![0, 1]);
    }

    #[test]
    fn test_scale_in_and_out_of_range() {
        let q = Question::scale("Rate", 1, 5);

        let (bins, _) = scale_counts(tally_scale(0, &q, &single(json!(3))));
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 0, 1, 0, 0]);
        assert_eq!(bins[2].label, "3");

        let (bins, unmatched) = scale_counts(tally_scale(0, &q, &single(json!(7))));
        assert!(bins.iter().all(|b| b.count == 0));
        assert_eq!(unmatched, 1);
    }

    #[test]
    fn test_scale_bins_with_no_responses() {
        let q = Question::scale("Rate", -2, 2);
        let (bins, unmatched) = scale_counts(tally_scale(0, &q, &[]));
        assert_eq!(bins.len(), 5);
        let labels: Vec<&str> = bins.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["-2", "-1", "0", "1", "2"]);
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn test_scale_defaults_to_one_through_five() {
        let q: Question = serde_json::from_value(json!({"kind": "scale"})).unwrap();
        let (bins, _) = scale_counts(tally_scale(0, &q, &single(json!(5))));
        assert_eq!(bins.len(), 5);
        assert_eq!(bins[4].count, 1);
    }

    #[test]
    fn test_scale_rejects_fractional_and_non_numeric() {
        let q = Question::scale("Rate", 1, 5);
        let rs = responses(vec![
            vec![json!(2.5)],
            vec![json!("abc")],
            vec![json!("")],
            vec![json!(true)],
            vec![json!("4")],
            vec![json!(4.0)],
        ]);

        let (bins, unmatched) = scale_counts(tally_scale(0, &q, &rs));
        assert_eq!(bins[3].count, 2);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert_eq!(unmatched, 4);
    }

    #[test]
    fn test_free_text_counts_non_empty() {
        let rs = responses(vec![
            vec![json!("great")],
            vec![json!("")],
            vec![Value::Null],
            vec![],
            vec![json!(" ")],
        ]);

        match tally_free_text(0, &rs) {
            Tally::FreeText { count } => {
                assert_eq!(count, 2);
                assert!(count <= rs.len());
            }
            other => panic!("expected free text tally, got {:?}", other),
        }
    }

    #[test]
    fn test_positional_correspondence() {
        let s = survey(vec![
            Question::free_text("Comments"),
            Question::multiple_choice("Color", &["Red", "Blue"]),
        ]);
        // Second answer belongs to the second question regardless of content.
        let rs = responses(vec![vec![json!(""), json!("Blue")], vec![json!("Blue")]]);

        let summary = summarize_survey(&s, &rs);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].tally, Tally::FreeText { count: 1 });
        let (_, counts, unmatched) = mc_counts(summary[1].tally.clone());
        assert_eq!(counts, vec![0, 1]);
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn test_empty_survey() {
        let s = survey(vec![]);
        assert!(summarize_survey(&s, &single(json!("x"))).is_empty());
    }

    #[test]
    fn test_summary_is_idempotent() {
        let s = survey(vec![
            Question::multiple_choice("Color", &["Red", "Blue"]),
            Question::scale("Rate", 1, 3),
            Question::free_text("Why"),
        ]);
        let rs = responses(vec![
            vec![json!("Red"), json!(2), json!("because")],
            vec![json!("Blue"), json!(9), json!("")],
        ]);

        let first = serde_json::to_string(&summarize_survey(&s, &rs)).unwrap();
        let second = serde_json::to_string(&summarize_survey(&s, &rs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_end_to_end_scale_example() {
        let s = survey(vec![Question::scale("Q", 1, 3)]);
        let rs = responses(vec![vec![json!(2)], vec![json!(2)], vec![json!(5)]]);

        let summary = summarize_survey(&s, &rs);
        let value = serde_json::to_value(&summary[0]).unwrap();
        assert_eq!(
            value["bins"],
            json!([
                {"label": "1", "count": 0},
                {"label": "2", "count": 2},
                {"label": "3", "count": 0}
            ])
        );
        assert_eq!(value["unmatched"], json!(1));
    }

    #[test]
    fn test_scale_bounds_beyond_float_precision() {
        let min = (1_i64 << 53) + 1;
        let q = Question::scale("Big", min, min + 2);
        let rs = responses(vec![
            vec![json!(1_i64 << 53)],
            vec![json!(min)],
            vec![json!((min + 2).to_string())],
            vec![json!(min + 3)],
        ]);

        let (bins, unmatched) = scale_counts(summarize_question(0, &q, &rs).tally);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 1]);
        assert_eq!(unmatched, 2);
    }

    #[test]
    fn test_scale_extreme_values_are_unmatched() {
        let q = Question::scale("Q", i64::MIN, i64::MIN + 1);
        let rs = responses(vec![
            vec![json!(i64::MAX)],
            vec![json!(u64::MAX)],
            vec![json!(1e300)],
            vec![json!(i64::MIN)],
        ]);

        let (bins, unmatched) = scale_counts(summarize_question(0, &q, &rs).tally);
        assert_eq!(bins[0].count, 1);
        assert_eq!(unmatched, 3);
    }
}
