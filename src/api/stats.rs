//! Cumulative processing counters since start-up.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::pipeline::summary::BatchSummary;

/// Shared between all requests; counters only ever grow.
pub struct ProcessingStats {
    started_at: DateTime<Utc>,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    emails_processed: AtomicU64,
    emails_succeeded: AtomicU64,
    emails_failed: AtomicU64,
    sync_failures: AtomicU64,
    llm_requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_usd: Mutex<Decimal>,
    last_batch_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    pub emails_processed: u64,
    pub emails_succeeded: u64,
    pub emails_failed: u64,
    pub sync_failures: u64,
    pub llm_requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: Decimal,
    pub last_batch_at: Option<DateTime<Utc>>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            batches_completed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            emails_processed: AtomicU64::new(0),
            emails_succeeded: AtomicU64::new(0),
            emails_failed: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            llm_requests: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            cost_usd: Mutex::new(Decimal::ZERO),
            last_batch_at: Mutex::new(None),
        }
    }
}

impl ProcessingStats {
    pub async fn record_batch(&self, summary: &BatchSummary) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        self.emails_processed
            .fetch_add(summary.total as u64, Ordering::Relaxed);
        self.emails_succeeded
            .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
        self.emails_failed
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
        self.sync_failures
            .fetch_add(summary.sync_failures as u64, Ordering::Relaxed);

        let usage = &summary.token_usage;
        self.llm_requests
            .fetch_add(u64::from(usage.requests), Ordering::Relaxed);
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
        *self.cost_usd.lock().await += usage.cost_usd;
        *self.last_batch_at.lock().await = Some(summary.processed_at);
    }

    /// A run that aborted before producing a summary.
    pub fn record_failed_batch(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            emails_processed: self.emails_processed.load(Ordering::Relaxed),
            emails_succeeded: self.emails_succeeded.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            llm_requests: self.llm_requests.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            cost_usd: *self.cost_usd.lock().await,
            last_batch_at: *self.last_batch_at.lock().await,
        }
    }
}
