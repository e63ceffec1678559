use serde_json::{Map, Value};
use tracing::warn;

const FENCE: &str = "```";

/// Returns the interior of a single outer ```` ```[tag] ... ``` ```` wrapper,
/// trimmed, or `text` unchanged when there is no such wrapper.
pub fn unwrap_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_suffix(FENCE))
    else {
        return text;
    };
    let body = inner.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_');
    let body = body.trim();
    if body.is_empty() {
        return text;
    }
    body
}

/// Parses model output into a JSON object, tolerating a markdown fence.
/// Anything that is not a single JSON object yields `None`.
pub fn parse(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!("model response is empty");
        return None;
    }
    let candidate = unwrap_fence(trimmed);
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            warn!(
                "model response is JSON but not an object ({}): {}",
                json_kind(&other),
                candidate
            );
            None
        }
        Err(err) => {
            warn!("failed to parse model response as JSON: {}; text: {}", err, candidate);
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_tagged_fence() {
        assert_eq!(parse("```json\n{\"a\":1}\n```"), Some(object(json!({"a": 1}))));
    }

    #[test]
    fn rejects_plain_prose() {
        assert_eq!(parse("not json"), None);
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(parse(""), None);
        assert_eq!(parse(" \n\t "), None);
    }

    #[test]
    fn unwrapped_and_fenced_inputs_agree() {
        let inner = "{\"itemName\": \"Doombringer\", \"attributes\": []}";
        for fenced in [
            format!("```json\n{}\n```", inner),
            format!("```\n{}\n```", inner),
            format!("  ```JSON   \r\n{}\r\n  ```  ", inner),
            format!("```{}```", inner),
        ] {
            assert_eq!(parse(&fenced), parse(inner), "input: {:?}", fenced);
        }
        assert!(parse(inner).is_some());
    }

    #[test]
    fn unwrap_without_fence_returns_input() {
        assert_eq!(unwrap_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(unwrap_fence(""), "");
    }

    #[test]
    fn unwrap_single_fence_returns_interior() {
        assert_eq!(unwrap_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(unwrap_fence("```json {\"a\":1} ```"), "{\"a\":1}");
    }

    #[test]
    fn unwrap_malformed_fences_is_total() {
        assert_eq!(unwrap_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
        assert_eq!(unwrap_fence("{\"a\":1}\n```"), "{\"a\":1}\n```");
        assert_eq!(unwrap_fence("```json```"), "```json```");
        assert_eq!(unwrap_fence("```"), "```");
        assert_eq!(unwrap_fence("``````"), "``````");
    }

    #[test]
    fn nested_fences_fall_through_to_the_json_parser() {
        let text = "```json\n```json\n{\"a\":1}\n```\n```";
        assert_eq!(unwrap_fence(text), "```json\n{\"a\":1}\n```");
        assert_eq!(parse(text), None);
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert_eq!(parse("[1, 2]"), None);
        assert_eq!(parse("```json\n42\n```"), None);
    }
}
