// Helpers for the OpenAI-style chat JSON the host passes around.
//
// Request bodies carry a `messages` array of {role, content}; responses are
// chat completions with a `choices` array. Hosts are loose about both, so
// every accessor tolerates missing or wrong-typed fields.

use serde_json::{json, Value};

/// Build a single-choice assistant completion.
pub fn completion_response(content: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
            "index": 0
        }]
    })
}

/// Build the error-shaped completion returned when a request is refused.
/// `kind` is machine-readable; `retry_after_secs` is advisory.
pub fn error_response(content: &str, kind: &str, retry_after_secs: u64) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "error",
            "index": 0
        }],
        "error": true,
        "error_kind": kind,
        "retry_after": retry_after_secs
    })
}

/// Whether a response produced by a filter is an error response.
pub fn is_error_response(response: &Value) -> bool {
    response.get("error").and_then(Value::as_bool).unwrap_or(false)
}

/// Mutable access to the request's message list, if it has one.
pub fn messages_mut(body: &mut Value) -> Option<&mut Vec<Value>> {
    body.get_mut("messages")?.as_array_mut()
}

/// Content of the last message in a request body.
pub fn last_message_content(body: &Value) -> Option<&str> {
    body.get("messages")?
        .as_array()?
        .last()?
        .get("content")?
        .as_str()
}

/// Append `[System: note]` to the last message's content. Returns false
/// when the body has no message with string content to annotate.
pub fn annotate_last_message(body: &mut Value, note: &str) -> bool {
    let Some(last) = messages_mut(body).and_then(|m| m.last_mut()) else {
        return false;
    };
    let Some(content) = last.get("content").and_then(Value::as_str) else {
        return false;
    };
    let annotated = format!("{content}\n\n[System: {note}]");
    last["content"] = Value::String(annotated);
    true
}

/// Text of the first choice: `message.content` for chat completions,
/// `text` for legacy completions.
pub fn response_content(response: &Value) -> Option<&str> {
    let choice = response.get("choices")?.as_array()?.first()?;
    match choice.get("message") {
        Some(message) if message.is_object() => message.get("content")?.as_str(),
        _ => choice.get("text")?.as_str(),
    }
}
