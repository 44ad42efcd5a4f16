//! Error body returned by the backend on non-success responses

use serde::Deserialize;

/// Spring-style error body: `{ "message": "...", "error": "...", ... }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Human-readable message, preferring `message` over `error`.
    /// Empty strings count as missing.
    pub fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or(self.error.filter(|e| !e.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_preferred_over_error() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message":"Insufficient funds","error":"Bad Request"}"#)
                .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Insufficient funds"));
    }

    #[test]
    fn test_error_used_when_message_missing() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Forbidden","status":403}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Forbidden"));
    }

    #[test]
    fn test_no_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":""}"#).unwrap();
        assert!(body.into_message().is_none());
    }
}
