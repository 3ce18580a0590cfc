//! Per-run aggregation.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::llm::costs;
use crate::llm::provider::CompletionResponse;
use crate::pipeline::types::{
    ActionStatus, ProcessingRecord, ProcessingStatus, READY_TO_SEND_CONFIDENCE, Tone,
};

/// Confidence buckets on `confidence * 100`, upper bounds inclusive.
const CONFIDENCE_BUCKETS: [(u32, &str); 5] = [
    (20, "0-20"),
    (40, "21-40"),
    (60, "41-60"),
    (80, "61-80"),
    (100, "81-100"),
];

/// Token usage and cost of the LLM calls made during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenUsage {
    pub requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: Decimal,
}

impl TokenUsage {
    /// Add one completed call priced at `prices` (input, output per token).
    pub fn record(&mut self, response: &CompletionResponse, prices: (Decimal, Decimal)) {
        let input = u64::from(response.input_tokens);
        let output = u64::from(response.output_tokens);
        self.requests += 1;
        self.input_tokens += input;
        self.output_tokens += output;
        self.cost_usd += costs::call_cost(prices, input, output);
    }
}

/// Occurrences of one command label across a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCount {
    pub command: String,
    pub count: usize,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records that failed only because the workflow store rejected them.
    pub sync_failures: usize,
    /// Mean confidence over succeeded records; 0 when there are none.
    pub average_confidence: f64,
    pub languages_detected: Vec<String>,
    /// Sorted by count, most frequent first.
    pub commands_summary: Vec<CommandCount>,
    pub confidence_distribution: BTreeMap<String, usize>,
    pub tone_distribution: BTreeMap<String, usize>,
    pub emails_by_team: BTreeMap<String, usize>,
    pub high_priority_count: usize,
    pub needs_review_count: usize,
    pub processing_time_secs: f64,
    pub processed_at: DateTime<Utc>,
    pub token_usage: TokenUsage,
    pub records: Vec<ProcessingRecord>,
}

impl BatchSummary {
    /// Aggregate finished records. Distributions cover succeeded records only.
    pub fn from_records(
        records: Vec<ProcessingRecord>,
        sync_failures: usize,
        token_usage: TokenUsage,
        elapsed: Duration,
    ) -> Self {
        let succeeded: Vec<&ProcessingRecord> = records
            .iter()
            .filter(|r| r.status == ProcessingStatus::Completed)
            .collect();
        let total = records.len();
        let succeeded_count = succeeded.len();

        let average_confidence = if succeeded.is_empty() {
            0.0
        } else {
            let sum: f64 = succeeded
                .iter()
                .map(|r| f64::from(r.classification.confidence))
                .sum();
            round3(sum / succeeded_count as f64)
        };

        let mut languages: Vec<String> = succeeded
            .iter()
            .map(|r| r.classification.language.clone())
            .collect();
        languages.sort();
        languages.dedup();

        let mut command_counts: HashMap<&str, usize> = HashMap::new();
        for record in &succeeded {
            for command in &record.classification.commands {
                *command_counts.entry(command.as_str()).or_default() += 1;
            }
        }
        let mut commands_summary: Vec<CommandCount> = command_counts
            .into_iter()
            .map(|(command, count)| CommandCount {
                command: command.to_string(),
                count,
            })
            .collect();
        commands_summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.command.cmp(&b.command)));

        let mut confidence_distribution: BTreeMap<String, usize> = CONFIDENCE_BUCKETS
            .iter()
            .map(|(_, label)| (label.to_string(), 0))
            .collect();
        let mut tone_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut emails_by_team: BTreeMap<String, usize> = BTreeMap::new();
        let mut high_priority_count = 0;
        let mut needs_review_count = 0;

        for record in &succeeded {
            let cls = &record.classification;
            *confidence_distribution
                .entry(confidence_bucket(cls.confidence).to_string())
                .or_default() += 1;
            *tone_distribution.entry(cls.tone.to_string()).or_default() += 1;
            *emails_by_team.entry(cls.team.to_string()).or_default() += 1;
            if cls.tone == Tone::Urgent || cls.confidence >= READY_TO_SEND_CONFIDENCE {
                high_priority_count += 1;
            }
            if record.action_status == ActionStatus::NeedsReview {
                needs_review_count += 1;
            }
        }

        Self {
            total,
            succeeded: succeeded_count,
            failed: total - succeeded_count,
            sync_failures,
            average_confidence,
            languages_detected: languages,
            commands_summary,
            confidence_distribution,
            tone_distribution,
            emails_by_team,
            high_priority_count,
            needs_review_count,
            processing_time_secs: round3(elapsed.as_secs_f64()),
            processed_at: Utc::now(),
            token_usage,
            records,
        }
    }
}

/// Bucket label for a confidence in [0, 1].
pub fn confidence_bucket(confidence: f32) -> &'static str {
    let pct = (f64::from(confidence) * 100.0).round().clamp(0.0, 100.0) as u32;
    CONFIDENCE_BUCKETS
        .iter()
        .find(|(upper, _)| pct <= *upper)
        .map(|(_, label)| *label)
        .unwrap_or("81-100")
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
