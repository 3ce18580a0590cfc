//! REST handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::AppState;
use super::error::ApiError;
use crate::llm::provider::{ChatMessage, CompletionRequest};
use crate::pipeline::taxonomy::BUSINESS_COMMANDS;
use crate::pipeline::types::{FetchWindow, Team, Tone};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENDPOINTS: &[&str] = &[
    "/api/health",
    "/api/test-connection",
    "/api/process-emails",
    "/api/process-batch",
    "/api/stats",
];

/// Languages the prompts are tuned for. Others still work.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "English",
    "Spanish",
    "French",
    "German",
    "Italian",
    "Portuguese",
    "Dutch",
    "Chinese",
    "Arabic",
];

// ── Request parsing ─────────────────────────────────────────────────

/// Body of the batch endpoints. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ProcessRequest {
    days: Option<i64>,
    max_results: Option<i64>,
    #[serde(default)]
    include_full_data: bool,
    sync: Option<bool>,
}

impl ProcessRequest {
    /// An empty body means all defaults.
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
    }

    fn window(&self) -> Result<FetchWindow, ApiError> {
        let defaults = FetchWindow::default();
        let days = to_u32(self.days, defaults.days(), "days")?;
        let max_results = to_u32(self.max_results, defaults.max_results(), "max_results")?;
        Ok(FetchWindow::new(days, max_results)?)
    }
}

fn to_u32(value: Option<i64>, default: u32, name: &str) -> Result<u32, ApiError> {
    match value {
        None => Ok(default),
        Some(v) => u32::try_from(v).map_err(|_| ApiError::BadRequest(format!("{name} is out of range"))),
    }
}

/// Drop message bodies from the serialized records.
fn strip_bodies(summary: &mut Value) {
    if let Some(records) = summary.get_mut("records").and_then(Value::as_array_mut) {
        for record in records {
            if let Some(message) = record.get_mut("message").and_then(Value::as_object_mut) {
                message.remove("body");
            }
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "mail-triage",
        "version": VERSION,
        "status": if state.missing.is_empty() { "online" } else { "degraded" },
        "endpoints": ENDPOINTS,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.missing.is_empty();
    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": Utc::now().to_rfc3339(),
        "services": state.services(),
        "missing": state.missing,
        "version": VERSION,
    });
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// GET /api/test-connection
pub async fn test_connection(State(state): State<AppState>) -> impl IntoResponse {
    let mut result = json!({
        "gmail_api": false,
        "openai_api": false,
        "notion_api": false,
    });

    match &state.fetcher {
        Some(fetcher) => match fetcher.profile().await {
            Ok(email) => {
                result["gmail_api"] = json!(true);
                result["gmail_email"] = json!(email);
            }
            Err(e) => result["gmail_error"] = json!(e.to_string()),
        },
        None => result["gmail_error"] = json!("Gmail not configured"),
    }

    match &state.llm {
        Some(llm) => {
            let request = CompletionRequest::new(vec![ChatMessage::user(
                "Test connection - reply with 'OK'",
            )])
            .with_temperature(0.0)
            .with_max_tokens(10);
            match llm.complete(request).await {
                Ok(response) if response.content.trim().to_uppercase().starts_with("OK") => {
                    result["openai_api"] = json!(true);
                }
                Ok(response) => {
                    result["openai_error"] = json!(format!("unexpected reply: {}", response.content.trim()));
                }
                Err(e) => result["openai_error"] = json!(e.to_string()),
            }
        }
        None => result["openai_error"] = json!("OpenAI not configured"),
    }

    match &state.store {
        Some(store) => match store.check_connection().await {
            Ok(()) => result["notion_api"] = json!(true),
            Err(e) => result["notion_error"] = json!(e.to_string()),
        },
        None => result["notion_error"] = json!("Notion not configured"),
    }

    let overall = result["gmail_api"] == json!(true) && result["openai_api"] == json!(true);
    result["overall_status"] = json!(overall);
    result["timestamp"] = json!(Utc::now().to_rfc3339());
    Json(result)
}

/// POST /api/process-emails
pub async fn process_emails(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let request = ProcessRequest::parse(&body)?;
    run_batch(&state, &request, false).await
}

/// POST /api/process-batch
pub async fn process_batch(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let request = ProcessRequest::parse(&body)?;
    run_batch(&state, &request, request.include_full_data).await
}

async fn run_batch(
    state: &AppState,
    request: &ProcessRequest,
    include_bodies: bool,
) -> Result<Json<Value>, ApiError> {
    let window = request.window()?;
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or_else(|| ApiError::NotConfigured(state.missing.clone()))?;

    info!(
        days = window.days(),
        max_results = window.max_results(),
        "Batch requested"
    );

    let summary = match orchestrator.run(window, request.sync.unwrap_or(true)).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Batch aborted");
            state.stats.record_failed_batch();
            return Err(e.into());
        }
    };
    state.stats.record_batch(&summary).await;

    let mut value = serde_json::to_value(&summary).map_err(|e| {
        warn!(error = %e, "Failed to serialize batch summary");
        ApiError::Internal(format!("failed to serialize summary: {e}"))
    })?;
    if !include_bodies {
        strip_bodies(&mut value);
    }
    Ok(Json(value))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let tones: Vec<&str> = Tone::ALL.iter().map(Tone::as_str).collect();
    let teams: Vec<&str> = Team::ALL.iter().map(Team::as_str).collect();
    Json(json!({
        "system_status": if state.missing.is_empty() { "healthy" } else { "degraded" },
        "services": state.services(),
        "stats": state.stats.snapshot().await,
        "capabilities": {
            "supported_languages": SUPPORTED_LANGUAGES,
            "command_categories": BUSINESS_COMMANDS.len(),
            "available_commands": BUSINESS_COMMANDS,
            "tones": tones,
            "teams": teams,
        },
        "version": VERSION,
        "last_check": Utc::now().to_rfc3339(),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "message": "The requested URL was not found on this server.",
            "available_endpoints": ENDPOINTS,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_uses_defaults() {
        let req = ProcessRequest::parse(b"").unwrap();
        assert_eq!(req.window().unwrap(), FetchWindow::default());
        assert!(!req.include_full_data);
        assert!(req.sync.is_none());
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        let req = ProcessRequest::parse(br#"{"days": 45}"#).unwrap();
        assert!(matches!(req.window(), Err(ApiError::Fetch(_))));
        let req = ProcessRequest::parse(br#"{"max_results": -1}"#).unwrap();
        assert!(matches!(req.window(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn non_integer_days_is_bad_request() {
        assert!(matches!(
            ProcessRequest::parse(br#"{"days": "seven"}"#),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn bodies_are_stripped() {
        let mut value = json!({
            "records": [{"message": {"id": "1", "body": "secret"}}]
        });
        strip_bodies(&mut value);
        assert!(value["records"][0]["message"].get("body").is_none());
        assert_eq!(value["records"][0]["message"]["id"], "1");
    }
}
