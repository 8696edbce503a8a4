use common::error::AppError;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{parse, required_field, string_field};

const VALID_ANSWERS: [&str; 4] = ["A", "B", "C", "D"];

/// One validated multiple-choice question.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizQuestion {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    pub explanation: String,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSet {
    pub questions: Vec<QuizQuestion>,
    pub count: usize,
}

/// Validates a raw quiz response.
///
/// Malformed items are skipped, not fatal; the run fails only when no item
/// survives. Surviving questions get a zero-based display order in input
/// order.
pub fn validate(raw: &str) -> Result<QuizSet, AppError> {
    let payload = parse::extract_payload(raw, &["questions"])?;

    let mut questions: Vec<QuizQuestion> =
        super::collect_records(&payload, "questions", normalize_question);
    for (order, question) in questions.iter_mut().enumerate() {
        question.order = order;
    }

    if questions.is_empty() {
        return Err(AppError::ValidationEmpty(
            "No valid questions generated".into(),
        ));
    }

    debug!(count = questions.len(), "quiz response validated");
    let count = questions.len();
    Ok(QuizSet { questions, count })
}

fn normalize_question(item: &Value) -> Option<QuizQuestion> {
    let correct_answer = string_field(item, "correct_answer")?.to_uppercase();
    if !VALID_ANSWERS.contains(&correct_answer.as_str()) {
        return None;
    }

    Some(QuizQuestion {
        question: required_field(item, "question")?,
        option_a: required_field(item, "option_a")?,
        option_b: required_field(item, "option_b")?,
        option_c: required_field(item, "option_c")?,
        option_d: required_field(item, "option_d")?,
        correct_answer,
        explanation: string_field(item, "explanation").unwrap_or_default(),
        order: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(correct: &str) -> Value {
        json!({
            "question": "Which organelle hosts respiration?",
            "option_a": "Nucleus",
            "option_b": "Mitochondrion",
            "option_c": "Ribosome",
            "option_d": "Golgi body",
            "correct_answer": correct,
            "explanation": "Respiration happens in mitochondria."
        })
    }

    #[test]
    fn whitespace_and_case_in_the_answer_are_normalized() {
        let raw = json!({"questions": [question(" b ")]}).to_string();
        let set = validate(&raw).expect("validate");
        assert_eq!(set.count, 1);
        assert_eq!(set.questions[0].correct_answer, "B");
    }

    #[test]
    fn out_of_range_answer_drops_the_item() {
        let raw = json!({"questions": [question("e"), question("A")]}).to_string();
        let set = validate(&raw).expect("validate");
        assert_eq!(set.count, 1);
        assert_eq!(set.questions[0].correct_answer, "A");
    }

    #[test]
    fn missing_option_drops_the_item_but_not_the_run() {
        let mut broken = question("C");
        broken
            .as_object_mut()
            .map(|object| object.remove("option_d"));
        let raw = json!({"questions": [broken, question("D")]}).to_string();

        let set = validate(&raw).expect("one valid item is enough");
        assert_eq!(set.count, 1);
        assert_eq!(set.questions[0].correct_answer, "D");
    }

    #[test]
    fn surviving_items_get_sequential_orders() {
        let raw = json!({"questions": [question("A"), question("e"), question("C")]}).to_string();
        let set = validate(&raw).expect("validate");
        let orders: Vec<usize> = set.questions.iter().map(|q| q.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn missing_explanation_defaults_to_empty() {
        let mut item = question("A");
        item.as_object_mut().map(|object| object.remove("explanation"));
        let raw = json!({"questions": [item]}).to_string();

        let set = validate(&raw).expect("validate");
        assert_eq!(set.questions[0].explanation, "");
    }

    #[test]
    fn zero_survivors_is_a_validation_empty_failure() {
        let raw = json!({"questions": [question("x")]}).to_string();
        let err = validate(&raw).err().expect("must fail");
        assert!(matches!(err, AppError::ValidationEmpty(_)));
    }

    #[test]
    fn fenced_response_still_validates() {
        let raw = format!("```json\n{}\n```", json!({"questions": [question("A")]}));
        let set = validate(&raw).expect("validate");
        assert_eq!(set.count, 1);
    }
}
