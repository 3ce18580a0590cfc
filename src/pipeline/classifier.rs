//! Language and intent classification.
//!
//! One LLM call per message. The response is parsed leniently: every field
//! has a default, so only output with no JSON object in it at all fails.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClassificationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::summary::TokenUsage;
use crate::pipeline::taxonomy::{self, BUSINESS_COMMANDS};
use crate::pipeline::types::{
    ClassificationResult, InboundMessage, Team, Tone, clamp_confidence,
};

/// Max body characters sent to the model.
pub const BODY_PREVIEW_CHARS: usize = 2000;

const CLASSIFY_MAX_TOKENS: u32 = 500;
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Classifies inbound messages with an LLM.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one message, adding the call's token usage to `usage`.
    pub async fn classify(
        &self,
        message: &InboundMessage,
        usage: &mut TokenUsage,
    ) -> Result<ClassificationResult, ClassificationError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(message)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        usage.record(&response, self.llm.cost_per_token());
        if response.finish_reason == FinishReason::Length {
            warn!(id = %message.id, "Classification response hit the token limit");
        }

        let result = parse_classification(&response.content).inspect_err(|e| {
            warn!(
                id = %message.id,
                raw_response = %response.content,
                error = %e,
                "Failed to parse classification response"
            );
        })?;

        debug!(
            id = %message.id,
            language = %result.language,
            tone = %result.tone,
            team = %result.team,
            confidence = result.confidence,
            "Classified message"
        );
        Ok(result)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    let tones: Vec<&str> = Tone::ALL.iter().map(Tone::as_str).collect();
    let teams: Vec<&str> = Team::ALL.iter().map(Team::as_str).collect();

    format!(
        "You classify business emails for a triage workflow.\n\n\
         For the email you are given, determine:\n\
         - language: the language it is written in, as an English name (e.g. \"English\", \"Spanish\")\n\
         - summary: one or two sentences in English\n\
         - commands: every applicable label from this list, and no others:\n  {commands}\n\
         - tone: one of {tones}\n\
         - confidence: how sure you are of the classification, from 0.0 to 1.0\n\
         - team: the team that should handle it, one of {teams}\n\n\
         Use \"spam_detected\" for spam, \"no_action\" when nothing needs doing and \
         \"requires_human_review\" when the request is sensitive or ambiguous.\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"language\": \"...\", \"summary\": \"...\", \"commands\": [\"...\"], \
         \"tone\": \"...\", \"confidence\": 0.0, \"team\": \"...\"}}",
        commands = BUSINESS_COMMANDS.join(", "),
        tones = tones.join(", "),
        teams = teams.join(", "),
    )
}

fn build_classify_user_prompt(message: &InboundMessage) -> String {
    let mut prompt = String::with_capacity(512);

    prompt.push_str(&format!("From: {}", message.sender));
    if let Some(ref name) = message.sender_name {
        prompt.push_str(&format!(" ({})", name));
    }
    prompt.push('\n');
    prompt.push_str(&format!("Subject: {}\n", message.subject));

    let preview: String = message.body.chars().take(BODY_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nBody:\n{}", preview));

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse a classification response, defaulting any missing field.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, ClassificationError> {
    let json_str = extract_json_object(raw);
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| ClassificationError::Unparseable(format!("JSON parse error: {e}")))?;
    let Value::Object(obj) = value else {
        return Err(ClassificationError::Unparseable(
            "response is not a JSON object".into(),
        ));
    };

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let commands = match obj.get("commands") {
        Some(Value::Array(items)) => {
            taxonomy::normalize_commands(items.iter().filter_map(Value::as_str))
        }
        Some(Value::String(list)) => taxonomy::normalize_commands(list.split(',')),
        _ => taxonomy::normalize_commands(Vec::<String>::new()),
    };

    let confidence = match obj.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    let team = text("team")
        .and_then(Team::parse)
        .unwrap_or_else(|| taxonomy::team_tags(&commands)[0]);

    Ok(ClassificationResult {
        language: text("language").unwrap_or("unknown").to_string(),
        summary: text("summary").unwrap_or_default().to_string(),
        tone: text("tone").map(Tone::parse).unwrap_or(Tone::Neutral),
        confidence: clamp_confidence(confidence),
        team,
        commands,
    })
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object, possibly followed by prose
    if trimmed.starts_with('{') {
        let end = trimmed.rfind('}').map_or(trimmed.len(), |i| i + 1);
        return trimmed[..end].to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
