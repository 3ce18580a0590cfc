//! Reply drafting.
//!
//! Produces a professional and a friendly reply in the sender's language.
//! Drafting never fails a record: any problem yields empty drafts.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::classifier::{BODY_PREVIEW_CHARS, extract_json_object};
use crate::pipeline::summary::TokenUsage;
use crate::pipeline::taxonomy;
use crate::pipeline::types::{ClassificationResult, InboundMessage, ReplyDrafts};

const DRAFT_MAX_TOKENS: u32 = 800;
const DRAFT_TEMPERATURE: f32 = 0.7;

/// Drafts suggested replies with an LLM.
pub struct ReplyDrafter {
    llm: Arc<dyn LlmProvider>,
}

impl ReplyDrafter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Draft both reply variants. Non-actionable mail gets empty drafts
    /// without an LLM call.
    pub async fn draft(
        &self,
        message: &InboundMessage,
        classification: &ClassificationResult,
        usage: &mut TokenUsage,
    ) -> ReplyDrafts {
        if taxonomy::is_non_actionable(&classification.commands) {
            debug!(id = %message.id, "Non-actionable message, skipping drafts");
            return ReplyDrafts::default();
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_draft_system_prompt(&classification.language)),
            ChatMessage::user(build_draft_user_prompt(message, classification)),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(id = %message.id, error = %e, "Reply drafting failed, using empty drafts");
                return ReplyDrafts::default();
            }
        };
        usage.record(&response, self.llm.cost_per_token());

        match parse_drafts(&response.content) {
            Some(drafts) => drafts,
            None => {
                warn!(
                    id = %message.id,
                    raw_response = %response.content,
                    "Failed to parse reply drafts, using empty drafts"
                );
                ReplyDrafts::default()
            }
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_draft_system_prompt(language: &str) -> String {
    let language = if language.eq_ignore_ascii_case("unknown") {
        "the same language as the email"
    } else {
        language
    };
    format!(
        "You write reply drafts for incoming business emails.\n\n\
         Write two replies in {language}:\n\
         - \"professional\": formal and concise, suitable for a first business contact\n\
         - \"friendly\": warm and conversational, still appropriate for work\n\n\
         Both replies must address the sender's request directly and must not \
         promise anything the email does not ask for. Do not include a subject line.\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"professional\": \"...\", \"friendly\": \"...\"}}"
    )
}

fn build_draft_user_prompt(message: &InboundMessage, classification: &ClassificationResult) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str(&format!("From: {}", message.sender));
    if let Some(ref name) = message.sender_name {
        prompt.push_str(&format!(" ({})", name));
    }
    prompt.push('\n');
    prompt.push_str(&format!("Subject: {}\n", message.subject));
    if !classification.summary.is_empty() {
        prompt.push_str(&format!("Summary: {}\n", classification.summary));
    }
    prompt.push_str(&format!(
        "Requests: {}\nTone: {}\n",
        classification.commands.join(", "),
        classification.tone
    ));

    let preview: String = message.body.chars().take(BODY_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nBody:\n{}", preview));

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct DraftResponse {
    #[serde(default)]
    professional: String,
    #[serde(default)]
    friendly: String,
}

/// Parse the drafts object. `None` when no usable JSON is present.
fn parse_drafts(raw: &str) -> Option<ReplyDrafts> {
    let response: DraftResponse = serde_json::from_str(&extract_json_object(raw)).ok()?;
    let drafts = ReplyDrafts {
        professional: response.professional.trim().to_string(),
        friendly: response.friendly.trim().to_string(),
    };
    (!drafts.is_empty()).then_some(drafts)
}
