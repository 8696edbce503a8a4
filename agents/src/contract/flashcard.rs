use common::error::AppError;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{coerce_i64, parse, required_field};

const DEFAULT_PRIORITY: u8 = 3;

/// One validated study card. Priority 1 is the most critical material.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    pub priority: u8,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlashcardSet {
    pub flashcards: Vec<Flashcard>,
    pub count: usize,
}

/// Validates a raw flashcard response.
///
/// Cards with a blank front or back are dropped. Priorities are clamped to
/// [1,5] with 3 as the default, the final list is sorted by (priority,
/// original position) and display order is reassigned after sorting.
pub fn validate(raw: &str) -> Result<FlashcardSet, AppError> {
    let payload = parse::extract_payload(raw, &["flashcards"])?;

    let mut flashcards: Vec<Flashcard> =
        super::collect_records(&payload, "flashcards", normalize_card);

    if flashcards.is_empty() {
        return Err(AppError::ValidationEmpty(
            "No valid flashcards generated".into(),
        ));
    }

    // `collect_records` preserves input order, so position doubles as the
    // stable tie-breaker required for equal priorities.
    for (position, card) in flashcards.iter_mut().enumerate() {
        card.order = position;
    }
    flashcards.sort_by_key(|card| (card.priority, card.order));
    for (order, card) in flashcards.iter_mut().enumerate() {
        card.order = order;
    }

    debug!(count = flashcards.len(), "flashcard response validated");
    let count = flashcards.len();
    Ok(FlashcardSet { flashcards, count })
}

fn normalize_card(item: &Value) -> Option<Flashcard> {
    let priority = item
        .get("priority")
        .and_then(coerce_i64)
        .unwrap_or(i64::from(DEFAULT_PRIORITY))
        .clamp(1, 5) as u8;

    Some(Flashcard {
        front: required_field(item, "front")?,
        back: required_field(item, "back")?,
        priority,
        order: 0,
    })
}
