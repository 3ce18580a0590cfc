//! Mail triage pipeline.
//!
//! Every batch flows through:
//! 1. `MailFetcher::fetch_recent()`: mailbox I/O
//! 2. `Classifier::classify()`: language, intent, tone, team
//! 3. `ReplyDrafter::draft()`: professional and friendly replies
//! 4. `WorkflowStore::write_record()`: optional logging for follow-up
//!
//! `BatchOrchestrator` runs the steps per message and aggregates a
//! `BatchSummary`. Nothing is ever sent back to the sender.

pub mod classifier;
pub mod drafter;
pub mod orchestrator;
pub mod summary;
pub mod taxonomy;
pub mod types;

pub use classifier::Classifier;
pub use drafter::ReplyDrafter;
pub use orchestrator::BatchOrchestrator;
pub use summary::{BatchSummary, TokenUsage};
