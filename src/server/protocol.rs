use serde::{Deserialize, Serialize};

/// One request line
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One response line; exactly one of `result` and `error` is set
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTextParams {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    pub question: String,
}

impl Response {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorResponse {
                code,
                message: message.into(),
            }),
        }
    }
}
