//! HTTP surface: health, connection test, batch runs and statistics.

pub mod error;
pub mod routes;
pub mod stats;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::channels::GmailClient;
use crate::config::AppConfig;
use crate::llm::{self, LlmProvider};
use crate::pipeline::BatchOrchestrator;
use crate::pipeline::types::MailFetcher;
use crate::store::{NotionClient, WorkflowStore};

pub use error::ApiError;
pub use stats::ProcessingStats;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Option<Arc<dyn MailFetcher>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub store: Option<Arc<dyn WorkflowStore>>,
    /// Present only when both a fetcher and an LLM are configured.
    pub orchestrator: Option<Arc<BatchOrchestrator>>,
    pub stats: Arc<ProcessingStats>,
    /// Required dependencies with no credential ("gmail_api", "openai_api").
    pub missing: Vec<&'static str>,
}

impl AppState {
    pub fn new(
        fetcher: Option<Arc<dyn MailFetcher>>,
        llm: Option<Arc<dyn LlmProvider>>,
        store: Option<Arc<dyn WorkflowStore>>,
    ) -> Self {
        let mut missing = Vec::new();
        if fetcher.is_none() {
            missing.push("gmail_api");
        }
        if llm.is_none() {
            missing.push("openai_api");
        }

        let orchestrator = match (&fetcher, &llm) {
            (Some(f), Some(l)) => Some(Arc::new(BatchOrchestrator::new(
                f.clone(),
                l.clone(),
                store.clone(),
            ))),
            _ => None,
        };

        Self {
            fetcher,
            llm,
            store,
            orchestrator,
            stats: Arc::new(ProcessingStats::default()),
            missing,
        }
    }

    /// Which integrations are configured.
    pub fn services(&self) -> Value {
        json!({
            "gmail_api": self.fetcher.is_some(),
            "openai_api": self.llm.is_some(),
            "notion_api": self.store.is_some(),
        })
    }
}

/// Build clients for every configured integration.
pub fn build_state(config: &AppConfig) -> crate::error::Result<AppState> {
    let timeout = config.server.http_timeout;

    let fetcher: Option<Arc<dyn MailFetcher>> = match &config.gmail {
        Some(gmail) => Some(Arc::new(GmailClient::new(gmail.clone(), timeout)?)),
        None => None,
    };

    let llm = config.ai.as_ref().map(llm::create_provider).transpose()?;

    let store: Option<Arc<dyn WorkflowStore>> = match &config.notion {
        Some(notion) => Some(Arc::new(NotionClient::new(notion.clone(), timeout)?)),
        None => None,
    };

    let missing = config.missing_dependencies();
    if !missing.is_empty() {
        warn!(missing = ?missing, "Starting without required credentials; batch endpoints will return 503");
    }

    Ok(AppState::new(fetcher, llm, store))
}

/// Build the Axum router with all REST routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/api/health", get(routes::health))
        .route("/api/test-connection", get(routes::test_connection))
        .route("/api/process-emails", post(routes::process_emails))
        .route("/api/process-batch", post(routes::process_batch))
        .route("/api/stats", get(routes::stats))
        .fallback(routes::not_found)
        .layer(cors)
        .with_state(state)
}
