//! Wire types for the Gmail REST API and Google's OAuth token endpoint.

use serde::Deserialize;

/// `GET users/{id}/messages`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// Entry returned by the list call; only the id is needed.
#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// `GET users/{id}/messages/{msg}?format=raw`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(default)]
    pub internal_date: Option<String>,
    /// Base64url-encoded RFC 822 message.
    #[serde(default)]
    pub raw: Option<String>,
}

/// `GET users/{id}/profile`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
}

/// Refresh-token grant response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Google API error envelope (`{"error": {"code", "message"}}`).
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Best-effort human-readable message from an error body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_response_without_messages() {
        let parsed: ListMessagesResponse =
            serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn raw_message_fields() {
        let parsed: RawMessage = serde_json::from_str(
            r#"{"id":"a","threadId":"t","internalDate":"1700000000000","raw":"SGk"}"#,
        )
        .unwrap();
        assert_eq!(parsed.thread_id, "t");
        assert_eq!(parsed.internal_date.as_deref(), Some("1700000000000"));
    }

    #[test]
    fn error_message_prefers_envelope() {
        let body = r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#;
        assert_eq!(error_message(body), "Insufficient Permission");
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
