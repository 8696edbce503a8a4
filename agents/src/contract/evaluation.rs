use common::error::AppError;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{coerce_f64, parse, string_field};

/// One graded answer with its 1-based position on the sheet.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluatedQuestion {
    pub question_text: String,
    pub student_answer: String,
    pub ideal_answer: String,
    pub score_percentage: f32,
    pub feedback: String,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub questions: Vec<EvaluatedQuestion>,
    pub overall_score: f32,
    pub general_feedback: String,
}

/// Validates a raw answer-sheet evaluation response.
///
/// Per-question scores are coerced to floats and clamped to [0,100]. A
/// missing overall score is derived as the mean of the question scores —
/// absent input is computed, never defaulted to zero. Zero questions is a
/// failure: an empty grading run must not look like a graded sheet.
pub fn validate(raw: &str) -> Result<EvaluationReport, AppError> {
    let payload = parse::extract_payload(raw, &["questions"])?;

    let mut questions: Vec<EvaluatedQuestion> =
        super::collect_records(&payload, "questions", normalize_question);
    for (position, question) in questions.iter_mut().enumerate() {
        question.order = position + 1;
    }

    if questions.is_empty() {
        return Err(AppError::ValidationEmpty(
            "No questions found in the answer sheet".into(),
        ));
    }

    let overall_score = match payload.get("overall_score").and_then(coerce_f64) {
        Some(score) => score.clamp(0.0, 100.0) as f32,
        None => {
            let sum: f32 = questions.iter().map(|q| q.score_percentage).sum();
            sum / questions.len() as f32
        }
    };

    debug!(
        count = questions.len(),
        overall_score, "evaluation response validated"
    );
    Ok(EvaluationReport {
        questions,
        overall_score,
        general_feedback: string_field(&payload, "general_feedback")
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "Evaluation complete.".to_owned()),
    })
}

fn normalize_question(item: &Value) -> Option<EvaluatedQuestion> {
    let score_percentage = item
        .get("score_percentage")
        .and_then(coerce_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0) as f32;

    Some(EvaluatedQuestion {
        question_text: string_field(item, "question_text").unwrap_or_default(),
        student_answer: string_field(item, "student_answer").unwrap_or_default(),
        ideal_answer: string_field(item, "ideal_answer").unwrap_or_default(),
        score_percentage,
        feedback: string_field(item, "feedback").unwrap_or_default(),
        order: 0,
    })
}
