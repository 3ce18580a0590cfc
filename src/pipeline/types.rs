//! Shared types for the message processing pipeline.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FetchError;
use crate::pipeline::taxonomy;

// ── Inbound message ─────────────────────────────────────────────────

/// A normalized mailbox message. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider message id.
    pub id: String,
    /// Provider thread id.
    pub thread_id: String,
    /// Sender address (bare `user@domain` when it could be parsed).
    pub sender: String,
    /// Display name from the From header, if any.
    pub sender_name: Option<String>,
    pub subject: String,
    /// Plain text body.
    pub body: String,
    pub received_at: DateTime<Utc>,
}

// ── Fetch window ────────────────────────────────────────────────────

pub const MIN_DAYS: u32 = 1;
pub const MAX_DAYS: u32 = 30;
pub const MIN_RESULTS: u32 = 1;
pub const MAX_RESULTS: u32 = 100;

/// Lookback window for a fetch. Only constructible with in-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    days: u32,
    max_results: u32,
}

impl FetchWindow {
    pub fn new(days: u32, max_results: u32) -> Result<Self, FetchError> {
        if !(MIN_DAYS..=MAX_DAYS).contains(&days) {
            return Err(FetchError::InvalidWindow(format!(
                "days must be an integer between {MIN_DAYS} and {MAX_DAYS}"
            )));
        }
        if !(MIN_RESULTS..=MAX_RESULTS).contains(&max_results) {
            return Err(FetchError::InvalidWindow(format!(
                "max_results must be an integer between {MIN_RESULTS} and {MAX_RESULTS}"
            )));
        }
        Ok(Self { days, max_results })
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Earliest receive time inside the window, relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.days))
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            days: 7,
            max_results: 50,
        }
    }
}

// ── Mail fetcher trait ──────────────────────────────────────────────

/// Mailbox access. Pure I/O, no business logic.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Provider name for logs and errors (e.g. "gmail").
    fn name(&self) -> &str;

    /// Messages received inside `window`, newest first, at most
    /// `window.max_results()` of them.
    async fn fetch_recent(&self, window: FetchWindow) -> Result<Vec<InboundMessage>, FetchError>;

    /// Mailbox address of the authenticated account.
    async fn profile(&self) -> Result<String, FetchError>;
}

// ── Classification ──────────────────────────────────────────────────

/// Emotional tone of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
    Urgent,
    Confused,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Positive,
        Tone::Neutral,
        Tone::Negative,
        Tone::Urgent,
        Tone::Confused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Urgent => "urgent",
            Self::Confused => "confused",
        }
    }

    /// Lenient parse; anything unrecognized is neutral.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == raw)
            .unwrap_or(Self::Neutral)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Sales,
    Support,
    #[serde(rename = "HR")]
    Hr,
    Finance,
    Legal,
    Operations,
    Marketing,
    General,
}

impl Team {
    pub const ALL: [Team; 8] = [
        Team::Sales,
        Team::Support,
        Team::Hr,
        Team::Finance,
        Team::Legal,
        Team::Operations,
        Team::Marketing,
        Team::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::Support => "Support",
            Self::Hr => "HR",
            Self::Finance => "Finance",
            Self::Legal => "Legal",
            Self::Operations => "Operations",
            Self::Marketing => "Marketing",
            Self::General => "General",
        }
    }

    /// Case-insensitive parse. `None` for anything outside the enum.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a model-reported confidence into [0, 1]. NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}

/// Structured classification of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Language name in English (e.g. "Spanish"), or "unknown".
    pub language: String,
    pub summary: String,
    /// Labels from the business taxonomy. Never empty.
    pub commands: Vec<String>,
    pub tone: Tone,
    /// Always within [0, 1].
    pub confidence: f32,
    pub team: Team,
}

impl ClassificationResult {
    /// Safe defaults used when the model response cannot be used at all.
    pub fn fallback() -> Self {
        Self {
            language: "unknown".to_string(),
            summary: String::new(),
            commands: vec![taxonomy::NO_ACTION.to_string()],
            tone: Tone::Neutral,
            confidence: 0.0,
            team: Team::General,
        }
    }

    pub fn has_command(&self, label: &str) -> bool {
        self.commands.iter().any(|c| c == label)
    }
}

/// Two stylistic variants of a suggested reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyDrafts {
    pub professional: String,
    pub friendly: String,
}

impl ReplyDrafts {
    pub fn is_empty(&self) -> bool {
        self.professional.is_empty() && self.friendly.is_empty()
    }
}

// ── Processing record ───────────────────────────────────────────────

/// Lifecycle of a processing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Title-case label used by the workflow store.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

/// Confidence at or above which a draft is considered ready to send.
pub const READY_TO_SEND_CONFIDENCE: f32 = 0.8;
/// Confidence below which a human must review.
pub const NEEDS_REVIEW_CONFIDENCE: f32 = 0.4;

/// What a human should do next with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Skipped,
    Error,
    #[serde(rename = "Needs Review")]
    NeedsReview,
    #[serde(rename = "Ready to Send")]
    ReadyToSend,
    #[serde(rename = "Draft Generated")]
    DraftGenerated,
}

impl ActionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "Skipped",
            Self::Error => "Error",
            Self::NeedsReview => "Needs Review",
            Self::ReadyToSend => "Ready to Send",
            Self::DraftGenerated => "Draft Generated",
        }
    }

    pub fn determine(classification: &ClassificationResult, status: ProcessingStatus) -> Self {
        if status == ProcessingStatus::Failed {
            Self::Error
        } else if taxonomy::is_non_actionable(&classification.commands) {
            Self::Skipped
        } else if classification.has_command(taxonomy::REQUIRES_HUMAN_REVIEW)
            || classification.confidence < NEEDS_REVIEW_CONFIDENCE
        {
            Self::NeedsReview
        } else if classification.confidence >= READY_TO_SEND_CONFIDENCE {
            Self::ReadyToSend
        } else {
            Self::DraftGenerated
        }
    }
}

/// Combined result for one message; the unit written to the workflow store.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingRecord {
    pub id: Uuid,
    pub message: InboundMessage,
    pub classification: ClassificationResult,
    pub drafts: ReplyDrafts,
    pub status: ProcessingStatus,
    pub action_status: ActionStatus,
    /// Every team the commands route to (never empty).
    pub team_tags: Vec<Team>,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingRecord {
    /// A pending record for a classified message.
    pub fn new(
        message: InboundMessage,
        classification: ClassificationResult,
        drafts: ReplyDrafts,
    ) -> Self {
        let team_tags = taxonomy::team_tags(&classification.commands);
        let action_status = ActionStatus::determine(&classification, ProcessingStatus::Pending);
        Self {
            id: Uuid::new_v4(),
            message,
            classification,
            drafts,
            status: ProcessingStatus::Pending,
            action_status,
            team_tags,
            processed_at: Utc::now(),
            error: None,
        }
    }

    /// A failed record carrying fallback classification and empty drafts.
    pub fn failed(message: InboundMessage, error: impl Into<String>) -> Self {
        Self::new(message, ClassificationResult::fallback(), ReplyDrafts::default())
            .into_failed(error)
    }

    pub fn into_completed(mut self) -> Self {
        self.status = ProcessingStatus::Completed;
        self.action_status = ActionStatus::determine(&self.classification, self.status);
        self
    }

    pub fn into_failed(mut self, error: impl Into<String>) -> Self {
        self.status = ProcessingStatus::Failed;
        self.action_status = ActionStatus::determine(&self.classification, self.status);
        self.error = Some(error.into());
        self
    }
}
