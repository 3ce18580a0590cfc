//! End-to-end tests for the HTTP API.
//!
//! Each test starts the router on a random port with mock integrations and
//! talks to it over real HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use mail_triage::api::{self, AppState};
use mail_triage::error::{FetchError, LlmError, SyncError};
use mail_triage::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use mail_triage::pipeline::types::{FetchWindow, InboundMessage, MailFetcher, ProcessingRecord};
use mail_triage::store::WorkflowStore;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const GOOD_PRICING: &str = r#"{"language":"English","summary":"Pricing question","commands":["pricing_request"],"tone":"neutral","confidence":0.9,"team":"Sales"}"#;
const GOOD_COMPLAINT: &str = r#"{"language":"Spanish","summary":"Queja","commands":["complaint"],"tone":"negative","confidence":0.7,"team":"Support"}"#;

// ── Mocks ───────────────────────────────────────────────────────────

struct MockFetcher {
    messages: Vec<InboundMessage>,
    fail: bool,
}

#[async_trait]
impl MailFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_recent(&self, window: FetchWindow) -> Result<Vec<InboundMessage>, FetchError> {
        if self.fail {
            return Err(FetchError::Authentication {
                provider: "gmail".into(),
                reason: "invalid_grant".into(),
            });
        }
        Ok(self
            .messages
            .iter()
            .take(window.max_results() as usize)
            .cloned()
            .collect())
    }

    async fn profile(&self) -> Result<String, FetchError> {
        Ok("inbox@example.com".into())
    }
}

/// Classification prompts are answered from a queue, draft prompts with a
/// fixed pair, and bare prompts (the connection probe) with "OK".
struct ScriptedLlm {
    classifications: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: &[&str]) -> Self {
        let mut queue: Vec<String> = responses.iter().map(|r| r.to_string()).collect();
        queue.reverse();
        Self {
            classifications: Mutex::new(queue),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = match request.system_prompt() {
            None => "OK".to_string(),
            Some(p) if p.contains("reply drafts") => {
                r#"{"professional": "Dear customer,", "friendly": "Hi there!"}"#.to_string()
            }
            Some(_) => self
                .classifications
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "{}".to_string()),
        };
        Ok(CompletionResponse {
            content,
            input_tokens: 100,
            output_tokens: 20,
            finish_reason: FinishReason::Stop,
        })
    }
}

struct FailingStore;

#[async_trait]
impl WorkflowStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn write_record(&self, _record: &ProcessingRecord) -> Result<(), SyncError> {
        Err(SyncError::PermissionDenied("database not shared".into()))
    }

    async fn check_connection(&self) -> Result<(), SyncError> {
        Err(SyncError::PermissionDenied("database not shared".into()))
    }
}

fn message(n: usize) -> InboundMessage {
    InboundMessage {
        id: format!("m-{n}"),
        thread_id: format!("t-{n}"),
        sender: format!("customer{n}@example.com"),
        sender_name: None,
        subject: format!("Question {n}"),
        body: format!("Hello, this is the body of message {n}."),
        received_at: Utc::now() - chrono::Duration::hours(n as i64),
    }
}

fn configured_state(count: usize, responses: &[&str]) -> AppState {
    let fetcher: Arc<dyn MailFetcher> = Arc::new(MockFetcher {
        messages: (1..=count).map(message).collect(),
        fail: false,
    });
    let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::new(responses));
    AppState::new(Some(fetcher), Some(llm), None)
}

// ── Harness ─────────────────────────────────────────────────────────

/// Start the API on a random port and return the base URL.
async fn start_server(state: AppState) -> String {
    let app = api::router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

async fn post_json(url: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_without_credentials_names_missing_dependencies() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AppState::new(None, None, None)).await;

        let resp = reqwest::get(format!("{base}/api/health")).await.unwrap();
        assert_eq!(resp.status(), 503);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["missing"], json!(["gmail_api", "openai_api"]));
        assert_eq!(body["services"]["notion_api"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_with_credentials_is_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(0, &[])).await;

        let resp = reqwest::get(format!("{base}/api/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["gmail_api"], true);
        assert_eq!(body["services"]["openai_api"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn index_lists_endpoints() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AppState::new(None, None, None)).await;

        let body: Value = reqwest::get(format!("{base}/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "degraded");
        assert!(
            body["endpoints"]
                .as_array()
                .unwrap()
                .contains(&json!("/api/process-batch"))
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_route_is_404_with_endpoint_list() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AppState::new(None, None, None)).await;

        let resp = reqwest::get(format!("{base}/api/nope")).await.unwrap();
        assert_eq!(resp.status(), 404);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Endpoint not found");
        assert_eq!(body["available_endpoints"].as_array().unwrap().len(), 5);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn process_without_credentials_is_503() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AppState::new(None, None, None)).await;

        let resp = post_json(&format!("{base}/api/process-emails"), json!({})).await;
        assert_eq!(resp.status(), 503);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["missing"], json!(["gmail_api", "openai_api"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_range_window_is_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(1, &[GOOD_PRICING])).await;

        let resp = post_json(&format!("{base}/api/process-emails"), json!({"days": 0})).await;
        assert_eq!(resp.status(), 400);

        let resp = post_json(&format!("{base}/api/process-batch"), json!({"max_results": 500})).await;
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(1, &[GOOD_PRICING])).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/process-emails"))
            .header("content-type", "application/json")
            .body("{days: seven")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn one_malformed_classification_fails_only_that_email() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(
            3,
            &[GOOD_PRICING, "Sorry, I cannot classify this.", GOOD_COMPLAINT],
        ))
        .await;

        let resp = post_json(&format!("{base}/api/process-emails"), json!({"days": 7})).await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["total"], 3);
        assert_eq!(body["succeeded"], 2);
        assert_eq!(body["failed"], 1);

        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1]["status"], "failed");
        assert_eq!(records[1]["classification"]["team"], "General");
        assert!(records.iter().all(|r| r["message"].get("body").is_none()));
        assert_eq!(body["languages_detected"], json!(["English", "Spanish"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn process_batch_can_include_bodies() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(1, &[GOOD_PRICING])).await;

        let body: Value = post_json(
            &format!("{base}/api/process-batch"),
            json!({"max_results": 1, "include_full_data": true}),
        )
        .await
        .json()
        .await
        .unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(
            body["records"][0]["message"]["body"],
            "Hello, this is the body of message 1."
        );
        assert_eq!(body["records"][0]["drafts"]["professional"], "Dear customer,");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_body_uses_default_window() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(2, &[GOOD_PRICING, GOOD_PRICING])).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/process-batch"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["total"], 2);
        assert!(body["records"][0]["message"].get("body").is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn fetch_authentication_failure_is_401() {
    timeout(TEST_TIMEOUT, async {
        let fetcher: Arc<dyn MailFetcher> = Arc::new(MockFetcher {
            messages: Vec::new(),
            fail: true,
        });
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::new(&[]));
        let base = start_server(AppState::new(Some(fetcher), Some(llm), None)).await;

        let resp = post_json(&format!("{base}/api/process-emails"), json!({})).await;
        assert_eq!(resp.status(), 401);

        let stats: Value = reqwest::get(format!("{base}/api/stats"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["stats"]["batches_failed"], 1);
        assert_eq!(stats["stats"]["batches_completed"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sync_failure_is_reported_per_record() {
    timeout(TEST_TIMEOUT, async {
        let fetcher: Arc<dyn MailFetcher> = Arc::new(MockFetcher {
            messages: vec![message(1)],
            fail: false,
        });
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::new(&[GOOD_PRICING]));
        let store: Arc<dyn WorkflowStore> = Arc::new(FailingStore);
        let base = start_server(AppState::new(Some(fetcher), Some(llm), Some(store))).await;

        let body: Value = post_json(&format!("{base}/api/process-emails"), json!({}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["sync_failures"], 1);
        assert_eq!(body["records"][0]["status"], "failed");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stats_accumulate_across_batches() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(2, &[GOOD_PRICING, GOOD_COMPLAINT])).await;

        let resp = post_json(&format!("{base}/api/process-emails"), json!({})).await;
        assert_eq!(resp.status(), 200);

        let resp = reqwest::get(format!("{base}/api/stats")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();

        assert_eq!(body["system_status"], "healthy");
        assert_eq!(body["stats"]["batches_completed"], 1);
        assert_eq!(body["stats"]["emails_processed"], 2);
        assert_eq!(body["stats"]["emails_succeeded"], 2);
        // Two classifications and two draft calls.
        assert_eq!(body["stats"]["llm_requests"], 4);
        assert_eq!(body["capabilities"]["teams"].as_array().unwrap().len(), 8);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stats_are_served_without_credentials() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AppState::new(None, None, None)).await;

        let resp = reqwest::get(format!("{base}/api/stats")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["system_status"], "degraded");
        assert_eq!(body["stats"]["emails_processed"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn test_connection_reports_each_service() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(configured_state(0, &[])).await;

        let body: Value = reqwest::get(format!("{base}/api/test-connection"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["gmail_api"], true);
        assert_eq!(body["gmail_email"], "inbox@example.com");
        assert_eq!(body["openai_api"], true);
        assert_eq!(body["notion_api"], false);
        assert_eq!(body["notion_error"], "Notion not configured");
        assert_eq!(body["overall_status"], true);
    })
    .await
    .expect("test timed out");
}
