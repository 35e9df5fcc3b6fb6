//! JSON-RPC 2.0 message shapes exchanged with engines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const JSONRPC_VERSION: &str = "2.0";

/// Outbound request.
#[derive(Debug, Serialize)]
pub struct RequestMessage<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

impl<'a> RequestMessage<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<&'a Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Outbound notification (no id, no reply expected).
#[derive(Debug, Serialize)]
pub struct NotificationMessage<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

impl<'a> NotificationMessage<'a> {
    pub fn new(method: &'a str, params: Option<&'a Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Outbound reply to a request the engine sent us.
#[derive(Debug, Serialize)]
pub struct ReplyMessage {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub result: Value,
}

impl ReplyMessage {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// JSON-RPC error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Response to one of our requests.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<ResponseError>,
}

/// Anything an engine can send, before classification.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
}

/// Classified inbound message.
#[derive(Debug)]
pub enum Incoming {
    Response(Response),
    /// The engine asking us something; it expects a reply with the same id.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Incoming {
    /// Classify a decoded body. Returns `None` for shapes that are none of
    /// request, response or notification.
    pub fn from_value(value: Value) -> Option<Self> {
        let raw: RawMessage = serde_json::from_value(value).ok()?;
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Some(Incoming::Request {
                id,
                method,
                params: raw.params,
            }),
            (None, Some(method)) => Some(Incoming::Notification {
                method,
                params: raw.params,
            }),
            (Some(id), None) => Some(Incoming::Response(Response {
                id,
                result: raw.result,
                error: raw.error,
            })),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!({"textDocument": {"uri": "file:///a.ts"}});
        let msg = RequestMessage::new(3, "textDocument/documentSymbol", Some(&params));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 3);
        assert_eq!(value["method"], "textDocument/documentSymbol");
        assert_eq!(value["params"]["textDocument"]["uri"], "file:///a.ts");
    }

    #[test]
    fn test_paramless_messages_omit_params() {
        let value = serde_json::to_value(RequestMessage::new(1, "shutdown", None)).unwrap();
        assert!(value.get("params").is_none());

        let value = serde_json::to_value(NotificationMessage::new("exit", None)).unwrap();
        assert!(value.get("params").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_classify_response() {
        let msg = Incoming::from_value(json!({"jsonrpc": "2.0", "id": 4, "result": [1, 2]}));
        match msg {
            Some(Incoming::Response(r)) => {
                assert_eq!(r.id, json!(4));
                assert_eq!(r.result, Some(json!([1, 2])));
                assert!(r.error.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let msg = Incoming::from_value(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "error": {"code": -32601, "message": "Unhandled method"}
        }));
        match msg {
            Some(Incoming::Response(r)) => {
                let err = r.error.unwrap();
                assert_eq!(err.code, -32601);
                assert_eq!(err.to_string(), "Unhandled method (code -32601)");
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_engine_request_and_notification() {
        let req = Incoming::from_value(json!({
            "jsonrpc": "2.0", "id": "abc", "method": "window/workDoneProgress/create",
            "params": {"token": "t"}
        }));
        assert!(matches!(req, Some(Incoming::Request { ref method, .. }) if method == "window/workDoneProgress/create"));

        let note = Incoming::from_value(json!({"jsonrpc": "2.0", "method": "window/logMessage"}));
        assert!(matches!(note, Some(Incoming::Notification { .. })));
    }

    #[test]
    fn test_classify_garbage() {
        assert!(Incoming::from_value(json!({"jsonrpc": "2.0"})).is_none());
        assert!(Incoming::from_value(json!([1, 2, 3])).is_none());
        assert!(Incoming::from_value(json!({"id": 1, "error": "not an object"})).is_none());
    }
}
