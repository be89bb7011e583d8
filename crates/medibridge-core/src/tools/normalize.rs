//! Normalization of raw tool-host results
//!
//! Hosts answer in several shapes: an MCP `CallToolResult` object with a
//! `content` list of typed items, a bare list, or an arbitrary value. Every
//! shape becomes a [`ToolResult`].

use serde_json::{Map, Value};

use crate::types::ToolResult;

/// Convert a raw host value into a [`ToolResult`]
pub fn normalize_result(raw: Value) -> ToolResult {
    match raw {
        Value::Object(mut object) if object.contains_key("content") => {
            let is_error = object
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let content = normalize_content(object.remove("content").unwrap_or(Value::Null));

            if is_error {
                ToolResult {
                    ok: false,
                    error_message: Some(content_text(&content)),
                    content,
                }
            } else {
                ToolResult::success(content)
            }
        }
        Value::Array(_) => ToolResult::success(normalize_content(raw)),
        other => ToolResult::success(other),
    }
}

fn normalize_content(content: Value) -> Value {
    match content {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize_item).collect();
            if items.len() == 1 {
                items.remove(0)
            } else {
                Value::Array(items)
            }
        }
        other => normalize_item(other),
    }
}

/// `{"type":"text","text":...}` becomes its text, parsed as JSON when it is JSON
fn normalize_item(item: Value) -> Value {
    match item {
        Value::Object(object) => match text_item(&object) {
            Some(text) => parse_text(text),
            None => Value::Object(object),
        },
        other => other,
    }
}

fn text_item(object: &Map<String, Value>) -> Option<&str> {
    if object.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    object.get("text").and_then(Value::as_str)
}

fn parse_text(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    Value::String(text.to_string())
}

/// Textual rendering of normalized content, used as an error message
pub fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => "tool reported an error".to_string(),
        Value::Array(items) => items
            .iter()
            .map(content_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_json_text_item_collapses() {
        let raw = json!({
            "content": [{"type": "text", "text": "{\"medicine\":\"paracetamol\",\"stock\":12}"}],
            "isError": false
        });
        let result = normalize_result(raw);

        assert!(result.ok);
        assert_eq!(result.content, json!({"medicine": "paracetamol", "stock": 12}));
    }

    #[test]
    fn test_plain_text_item_stays_text() {
        let raw = json!({"content": [{"type": "text", "text": "Hay 5 unidades en Piura"}]});
        assert_eq!(normalize_result(raw).content, json!("Hay 5 unidades en Piura"));
    }

    #[test]
    fn test_single_plain_object_item_collapses_to_itself() {
        let raw = json!({"content": [{"location": "Piura"}]});
        let result = normalize_result(raw);

        assert!(result.ok);
        assert_eq!(result.content, json!({"location": "Piura"}));
    }

    #[test]
    fn test_multiple_items_stay_a_list() {
        let raw = json!({"content": [
            {"type": "text", "text": "[1, 2]"},
            {"type": "image", "data": "aGk=", "mimeType": "image/png"}
        ]});
        let result = normalize_result(raw);

        assert_eq!(result.content[0], json!([1, 2]));
        assert_eq!(result.content[1]["type"], "image");
    }

    #[test]
    fn test_is_error_becomes_failure() {
        let raw = json!({
            "content": [{"type": "text", "text": "medicine not found"}],
            "isError": true
        });
        let result = normalize_result(raw);

        assert!(!result.ok);
        assert_eq!(result.error_message.as_deref(), Some("medicine not found"));
    }

    #[test]
    fn test_other_shapes_pass_through() {
        assert_eq!(normalize_result(json!(42)).content, json!(42));
        assert_eq!(
            normalize_result(json!({"stock": 3})).content,
            json!({"stock": 3})
        );
        assert_eq!(
            normalize_result(json!([{"type": "text", "text": "ok"}])).content,
            json!("ok")
        );
    }
}
