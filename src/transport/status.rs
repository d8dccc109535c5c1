//! Response classification shared by the HTTP adapters.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::transport::{HttpResponse, TransportError};

/// Map a raw transport outcome into the error taxonomy.
pub fn classify(
    operation: &str,
    outcome: Result<HttpResponse, TransportError>,
) -> BridgeResult<HttpResponse> {
    let response = outcome.map_err(|e| BridgeError::network(operation, e))?;
    match response.status {
        401 => Err(BridgeError::Credential),
        200..=299 => Ok(response),
        status => Err(BridgeError::remote(Some(status), error_message(&response))),
    }
}

/// Decode a successful response body as JSON.
pub fn parse_json_body(response: &HttpResponse) -> BridgeResult<Value> {
    serde_json::from_str(&response.body).map_err(|e| {
        BridgeError::remote(Some(response.status), format!("Malformed response body: {}", e))
    })
}

/// Decode a JSON value into a typed backend response.
pub fn decode_json<T: DeserializeOwned>(body: &Value) -> BridgeResult<T> {
    T::deserialize(body).map_err(|e| BridgeError::remote(None, format!("Malformed response body: {}", e)))
}

/// Extract the backend's own message from an error body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"errors": [{"error": "..."}]}`; anything else falls back to the raw text.
pub fn error_message(response: &HttpResponse) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(&response.body) {
        if let Some(message) = message_from_json(&json) {
            return message;
        }
    }
    let text = response.body.trim();
    if text.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        text.to_string()
    }
}

pub(crate) fn message_from_json(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::String(message)) => return Some(message.clone()),
        Some(Value::Object(obj)) => {
            if let Some(message) = obj.get("message").and_then(Value::as_str) {
                return Some(message.to_string());
            }
        }
        _ => {}
    }
    let errors = json.get("errors")?.as_array()?;
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("error").and_then(Value::as_str).or_else(|| e.as_str()))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}
