use common::error::AppError;
use serde_json::Value;

/// One way of digging a JSON object out of a free-form model response.
///
/// Generators wrap their JSON in prose or code fences often enough that a
/// single `from_str` is not a contract. The cascade below is ordered from
/// cheapest to most forgiving and stops at the first strategy that yields an
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseStrategy {
    /// The entire response is the JSON document.
    Direct,
    /// The JSON sits inside a fenced block, with or without a language tag.
    FencedBlock,
    /// Scan for the first balanced `{...}` span mentioning an expected key.
    BalancedScan,
}

const CASCADE: [ParseStrategy; 3] = [
    ParseStrategy::Direct,
    ParseStrategy::FencedBlock,
    ParseStrategy::BalancedScan,
];

/// Applies the parse cascade and returns the first JSON object found.
///
/// `expected_keys` names the top-level keys the caller can work with; the
/// balanced scan uses them to skip unrelated objects embedded in prose.
/// Exhausting the cascade is an `LLMParsing` failure, never a panic.
pub fn extract_payload(raw: &str, expected_keys: &[&str]) -> Result<Value, AppError> {
    for strategy in CASCADE {
        if let Some(value) = strategy.apply(raw, expected_keys) {
            return Ok(value);
        }
    }
    Err(AppError::LLMParsing(format!(
        "response contains no JSON object with any of the expected keys {expected_keys:?}"
    )))
}

impl ParseStrategy {
    fn apply(self, raw: &str, expected_keys: &[&str]) -> Option<Value> {
        match self {
            Self::Direct => parse_object(raw.trim()),
            Self::FencedBlock => parse_object(fenced_interior(raw)?),
            Self::BalancedScan => balanced_scan(raw, expected_keys),
        }
    }
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

// Interior of the first fenced block, tolerating a language tag after the
// opening fence and prose around the block.
fn fenced_interior(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_fence = &raw[open + 3..];
    let line_end = after_fence.find('\n')?;
    let body = &after_fence[line_end + 1..];
    let close = body.rfind("```")?;
    Some(body[..close].trim())
}

fn balanced_scan(raw: &str, expected_keys: &[&str]) -> Option<Value> {
    let bytes = raw.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = raw[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_span_end(bytes, start) {
            let span = &raw[start..end];
            let mentions_key = expected_keys
                .iter()
                .any(|key| span.contains(&format!("\"{key}\"")));
            if mentions_key {
                if let Some(value) = parse_object(span) {
                    return Some(value);
                }
            }
        }
        search_from = start + 1;
    }
    None
}

// End (exclusive) of the balanced brace span starting at `start`, honoring
// string literals and escapes so braces inside values don't confuse the count.
fn balanced_span_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (position, &byte) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(position + 1);
                }
            }
            _ => {}
        }
    }
    None
}
