//! # JSON response envelope shared by the hub's services.
//!
//! Every endpoint of every service answers with the same shape:
//! ```text
//! { "success": true, "message": "...", "payload": <any, optional> }
//! ```
//! The control plane produces it; [`ServiceSession`](crate::ServiceSession)
//! consumes it from collaborators.

use serde::{Deserialize, Serialize};

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Human-readable message.
    pub message: Option<String>,
    /// Endpoint-specific data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Envelope<T> {
    /// Successful envelope carrying a payload.
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            message: None,
            payload: Some(payload),
        }
    }

    /// Successful envelope with only a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            payload: None,
        }
    }

    /// Failed envelope with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_omitted_when_absent() {
        let v = serde_json::to_value(Envelope::<()>::fail("Unknown mode name.")).unwrap();
        assert_eq!(v, json!({"success": false, "message": "Unknown mode name."}));
    }

    #[test]
    fn parses_envelope_without_message() {
        let env: Envelope = serde_json::from_value(json!({"success": true, "payload": [1, 2]})).unwrap();
        assert!(env.success);
        assert_eq!(env.message, None);
        assert_eq!(env.payload, Some(json!([1, 2])));
    }
}
