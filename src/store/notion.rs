//! Notion database writer.
//!
//! Each record becomes one page in the configured database. Property names
//! and types must match the database schema; Notion rejects the page with a
//! 400 otherwise.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::NotionConfig;
use crate::error::SyncError;
use crate::pipeline::types::ProcessingRecord;
use crate::store::traits::WorkflowStore;

/// API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps titles shown in the database view; longer text is cut.
pub const TITLE_LIMIT: usize = 100;
/// Maximum characters in a single rich-text block.
pub const RICH_TEXT_LIMIT: usize = 2000;

pub struct NotionClient {
    http: Client,
    token: SecretString,
    database_id: String,
    api_base: String,
}

impl NotionClient {
    pub fn new(config: NotionConfig, timeout: Duration) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            token: config.token,
            database_id: config.database_id,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, SyncError> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, path))
            .bearer_auth(self.token.expose_secret())
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SyncError::Request(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl WorkflowStore for NotionClient {
    fn name(&self) -> &str {
        "notion"
    }

    #[instrument(skip(self, record), fields(id = %record.message.id))]
    async fn write_record(&self, record: &ProcessingRecord) -> Result<(), SyncError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": record_properties(record),
        });
        let page = self.post("pages", &body).await?;
        let page_id = page.get("id").and_then(Value::as_str).unwrap_or("");
        debug!(page_id = %page_id, "Created Notion page");
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), SyncError> {
        let body = json!({
            "filter": { "property": "object", "value": "database" },
            "page_size": 1,
        });
        self.post("search", &body).await.map(|_| ())
    }
}

/// Map a record to the database's property schema.
pub fn record_properties(record: &ProcessingRecord) -> Value {
    let msg = &record.message;
    let cls = &record.classification;

    let commands: Vec<Value> = cls.commands.iter().map(|c| json!({ "name": c })).collect();
    let team_tags: Vec<Value> = record
        .team_tags
        .iter()
        .map(|t| json!({ "name": t.as_str() }))
        .collect();
    let confidence = (f64::from(cls.confidence) * 1000.0).round() / 1000.0;

    let mut props = json!({
        "Email Subject": { "title": rich_text(&msg.subject, TITLE_LIMIT) },
        "Received Date": { "date": { "start": msg.received_at.to_rfc3339() } },
        "Language": { "select": { "name": select_name(&cls.language) } },
        "Summary": { "rich_text": rich_text(&cls.summary, RICH_TEXT_LIMIT) },
        "Commands": { "multi_select": commands },
        "Tone": { "select": { "name": cls.tone.as_str() } },
        "Team": { "select": { "name": cls.team.as_str() } },
        "Team Tags": { "multi_select": team_tags },
        "Confidence Score": { "number": confidence },
        "Action Status": { "select": { "name": record.action_status.label() } },
        "Reply Draft 1": { "rich_text": rich_text(&record.drafts.professional, RICH_TEXT_LIMIT) },
        "Reply Draft 2": { "rich_text": rich_text(&record.drafts.friendly, RICH_TEXT_LIMIT) },
        "Processing Status": { "select": { "name": record.status.label() } },
        "Processed At": { "date": { "start": record.processed_at.to_rfc3339() } },
    });

    if msg.sender.contains('@') {
        props["Sender"] = json!({ "email": msg.sender });
    }

    props
}

fn rich_text(content: &str, limit: usize) -> Value {
    let truncated: String = content.chars().take(limit).collect();
    json!([{ "text": { "content": truncated } }])
}

/// Select option names may not contain commas.
fn select_name(value: &str) -> String {
    let cleaned = value.replace(',', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned.chars().take(TITLE_LIMIT).collect()
    }
}

fn status_error(status: StatusCode, body: &str) -> SyncError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::PermissionDenied(message),
        _ => SyncError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::pipeline::types::{
        ClassificationResult, InboundMessage, ReplyDrafts, Team, Tone,
    };

    fn record(sender: &str, subject: &str) -> ProcessingRecord {
        let message = InboundMessage {
            id: "m-1".into(),
            thread_id: "t-1".into(),
            sender: sender.into(),
            sender_name: None,
            subject: subject.into(),
            body: "Please send the contract.".into(),
            received_at: Utc::now(),
        };
        let classification = ClassificationResult {
            language: "English".into(),
            summary: "s".repeat(2500),
            commands: vec!["contract_request".into(), "schedule_demo".into()],
            tone: Tone::Neutral,
            confidence: 0.85,
            team: Team::Legal,
        };
        let drafts = ReplyDrafts {
            professional: "Dear customer".into(),
            friendly: "Hi!".into(),
        };
        ProcessingRecord::new(message, classification, drafts).into_completed()
    }

    #[test]
    fn properties_follow_schema() {
        let props = record_properties(&record("legal@example.com", "Contract"));
        assert_eq!(props["Email Subject"]["title"][0]["text"]["content"], "Contract");
        assert_eq!(props["Sender"]["email"], "legal@example.com");
        assert_eq!(props["Language"]["select"]["name"], "English");
        assert_eq!(props["Commands"]["multi_select"][1]["name"], "schedule_demo");
        assert_eq!(props["Team"]["select"]["name"], "Legal");
        assert_eq!(props["Team Tags"]["multi_select"][0]["name"], "Sales");
        assert_eq!(props["Team Tags"]["multi_select"][1]["name"], "Legal");
        assert_eq!(props["Confidence Score"]["number"], 0.85);
        assert_eq!(props["Action Status"]["select"]["name"], "Ready to Send");
        assert_eq!(props["Reply Draft 1"]["rich_text"][0]["text"]["content"], "Dear customer");
        assert_eq!(props["Processing Status"]["select"]["name"], "Completed");
    }

    #[test]
    fn text_is_truncated_to_limits() {
        let props = record_properties(&record("a@b.com", &"x".repeat(300)));
        let title = props["Email Subject"]["title"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(title.chars().count(), TITLE_LIMIT);
        let summary = props["Summary"]["rich_text"][0]["text"]["content"].as_str().unwrap();
        assert_eq!(summary.chars().count(), RICH_TEXT_LIMIT);
    }

    #[test]
    fn sender_without_at_is_omitted() {
        let props = record_properties(&record("unknown", "Hi"));
        assert!(props.get("Sender").is_none());
    }

    #[test]
    fn select_names_drop_commas() {
        assert_eq!(select_name("English, mostly"), "English  mostly");
        assert_eq!(select_name("  "), "unknown");
    }

    #[test]
    fn status_mapping() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"object":"error","status":400,"message":"Tone is not a property"}"#,
        );
        assert!(matches!(err, SyncError::Rejected { status: 400, ref message } if message == "Tone is not a property"));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "{}"),
            SyncError::PermissionDenied(_)
        ));
    }
}
