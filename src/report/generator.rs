//! Markdown and JSON survey reports.
//!
//! A report is a survey's analytics rendered for people (Markdown) or for
//! tooling (JSON).

use crate::analysis::summarize_survey;
use crate::models::{
    AnalyticsSummary, QuestionKind, QuestionSummary, ResponseSet, ScaleBin, Survey, Tally,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything a report shows.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyReport {
    pub survey: Survey,
    pub responses: usize,
    pub generated_at: DateTime<Utc>,
    pub analytics: AnalyticsSummary,
}

impl SurveyReport {
    pub fn new(survey: Survey, responses: &[ResponseSet]) -> Self {
        let analytics = summarize_survey(&survey, responses);
        Self {
            survey,
            responses: responses.len(),
            generated_at: Utc::now(),
            analytics,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &SurveyReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", report.survey.title));
    output.push_str(&generate_metadata_section(report));

    if report.analytics.is_empty() {
        output.push_str("This survey has no questions.\n\n");
    }

    let kinds = report.survey.questions.iter().map(|q| q.kind);
    for (index, (summary, kind)) in report.analytics.iter().zip(kinds).enumerate() {
        output.push_str(&generate_question_section(index, kind, summary));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &SurveyReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Survey:** `{}`\n", report.survey.id));
    section.push_str(&format!(
        "- **Created:** {}\n",
        report.survey.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Questions:** {}\n", report.analytics.len()));
    section.push_str(&format!("- **Responses:** {}\n", report.responses));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// Generate the section for one question.
fn generate_question_section(
    index: usize,
    kind: QuestionKind,
    summary: &QuestionSummary,
) -> String {
    let mut section = String::new();

    let text = if summary.text.is_empty() {
        "(untitled question)"
    } else {
        summary.text.as_str()
    };
    section.push_str(&format!("## {}. {}\n\n", index + 1, text));
    section.push_str(&format!("_{}_\n\n", kind));

    match &summary.tally {
        Tally::MultipleChoice {
            labels,
            counts,
            unmatched,
        } => {
            section.push_str("| Option | Count |\n");
            section.push_str("|:---|:---:|\n");
            for (label, count) in labels.iter().zip(counts) {
                section.push_str(&format!("| {} | {} |\n", escape_cell(label), count));
            }
            section.push('\n');
            section.push_str(&unmatched_note(*unmatched));
        }
        Tally::Scale { bins, unmatched } => {
            section.push_str(&generate_scale_table(bins));
            section.push_str(&unmatched_note(*unmatched));
        }
        Tally::FreeText { count } => {
            section.push_str(&format!("*{} written answers*\n\n", count));
        }
    }

    section
}

fn generate_scale_table(bins: &[ScaleBin]) -> String {
    let mut table = String::new();

    table.push_str("| Value | Count |\n");
    table.push_str("|:---:|:---:|\n");
    for bin in bins {
        table.push_str(&format!("| {} | {} |\n", bin.label, bin.count));
    }
    table.push('\n');

    table
}

fn unmatched_note(unmatched: usize) -> String {
    if unmatched == 0 {
        String::new()
    } else {
        format!("> {} answers did not match and were not counted.\n\n", unmatched)
    }
}

/// Keep user-supplied labels from breaking the table.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by surveyd*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &SurveyReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
