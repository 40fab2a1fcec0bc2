//! Extraction of a JSON value from free-form model output.
//!
//! Schema-guided JSON mode is a request, not a guarantee: models still wrap
//! the payload in markdown fences or add a sentence before or after it. The
//! extractor strips fences, then slices from the first opening delimiter to
//! the last closing one and parses that.

use serde_json::Value;
use tracing::{debug, trace};

/// Extract the JSON value embedded in `text`.
///
/// Returns `None` when there is no `{` or `[` at all, or when the sliced
/// candidate does not parse. Callers treat `None` as a failed request, never
/// as partial data.
pub fn extract_json(text: &str) -> Option<Value> {
    let cleaned = strip_fences(text);
    let cleaned = cleaned.trim();

    let start = match (cleaned.find('{'), cleaned.find('[')) {
        (Some(brace), Some(bracket)) => brace.min(bracket),
        (Some(brace), None) => brace,
        (None, Some(bracket)) => bracket,
        (None, None) => {
            debug!("No JSON delimiter in model output ({} bytes)", text.len());
            return None;
        }
    };

    let end = match (cleaned.rfind('}'), cleaned.rfind(']')) {
        (Some(brace), Some(bracket)) => brace.max(bracket),
        (Some(brace), None) => brace,
        (None, Some(bracket)) => bracket,
        (None, None) => return None,
    };

    if end < start {
        return None;
    }

    // Delimiters are ASCII, so both offsets sit on char boundaries.
    let candidate = cleaned.get(start..=end)?;
    trace!("JSON candidate: {} bytes at offset {start}", candidate.len());

    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Model output did not parse as JSON: {e}");
            None
        }
    }
}

/// Remove every triple-backtick fence marker, with or without a `json` tag.
fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}
