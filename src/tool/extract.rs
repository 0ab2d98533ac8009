use serde_json::{Map, Value};

use crate::tool::error_analysis::ExtractionError;

/// Slice from the first `{` to the last `}` inclusive, ignoring any chatter around it.
pub fn json_candidate(raw_output: &str) -> Option<&str> {
    let text = raw_output.trim();
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn extract_json_object(raw_output: &str) -> Result<Map<String, Value>, ExtractionError> {
    let candidate = json_candidate(raw_output).ok_or(ExtractionError::NoJsonObject)?;
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
    // A brace-delimited slice that parses can only be an object.
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractionError::InvalidJson("not a JSON object".to_string())),
    }
}
