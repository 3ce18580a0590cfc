//! Batch orchestration: fetch → classify → draft → sync, one message at a time.
//!
//! A fetch failure aborts the run. Anything that goes wrong for a single
//! message only fails that message's record.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::{FetchError, PipelineError};
use crate::llm::provider::LlmProvider;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::drafter::ReplyDrafter;
use crate::pipeline::summary::{BatchSummary, TokenUsage};
use crate::pipeline::types::{FetchWindow, InboundMessage, MailFetcher, ProcessingRecord};
use crate::store::traits::WorkflowStore;

/// Runs batches over the mailbox.
pub struct BatchOrchestrator {
    fetcher: Arc<dyn MailFetcher>,
    classifier: Classifier,
    drafter: ReplyDrafter,
    store: Option<Arc<dyn WorkflowStore>>,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn MailFetcher>,
        llm: Arc<dyn LlmProvider>,
        store: Option<Arc<dyn WorkflowStore>>,
    ) -> Self {
        Self {
            fetcher,
            classifier: Classifier::new(llm.clone()),
            drafter: ReplyDrafter::new(llm),
            store,
        }
    }

    /// Process every message in `window`. With `sync` false, or without a
    /// configured store, records are not written anywhere.
    pub async fn run(&self, window: FetchWindow, sync: bool) -> Result<BatchSummary, FetchError> {
        let started = Instant::now();
        info!(
            fetcher = self.fetcher.name(),
            days = window.days(),
            max_results = window.max_results(),
            "Starting batch"
        );

        let messages = self.fetcher.fetch_recent(window).await.inspect_err(|e| {
            error!(error = %e, "Fetch failed, aborting batch");
        })?;

        let store = if sync { self.store.as_deref() } else { None };
        let total = messages.len();
        let mut usage = TokenUsage::default();
        let mut records = Vec::with_capacity(total);
        let mut sync_failures = 0;

        for (i, message) in messages.into_iter().enumerate() {
            info!(
                index = i + 1,
                total,
                id = %message.id,
                sender = %message.sender,
                "Processing message"
            );
            let (record, sync_failed) = self.process_message(message, store, &mut usage).await;
            if sync_failed {
                sync_failures += 1;
            }
            records.push(record);
        }

        let summary = BatchSummary::from_records(records, sync_failures, usage, started.elapsed());
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            sync_failures = summary.sync_failures,
            secs = summary.processing_time_secs,
            "Batch complete"
        );
        Ok(summary)
    }

    /// Classify, draft and sync one message. Returns the finished record and
    /// whether the failure (if any) came from the store.
    async fn process_message(
        &self,
        message: InboundMessage,
        store: Option<&dyn WorkflowStore>,
        usage: &mut TokenUsage,
    ) -> (ProcessingRecord, bool) {
        let classification = match self.classifier.classify(&message, usage).await {
            Ok(c) => c,
            Err(e) => {
                let e = PipelineError::from(e);
                warn!(id = %message.id, error = %e, "Classification failed");
                return (ProcessingRecord::failed(message, e.to_string()), false);
            }
        };

        let drafts = self.drafter.draft(&message, &classification, usage).await;
        let record = ProcessingRecord::new(message, classification, drafts).into_completed();

        let Some(store) = store else {
            return (record, false);
        };

        match store.write_record(&record).await {
            Ok(()) => (record, false),
            Err(e) => {
                let e = PipelineError::from(e);
                warn!(id = %record.message.id, store = store.name(), error = %e, "Sync failed");
                (record.into_failed(e.to_string()), true)
            }
        }
    }
}
