//! Workflow store trait.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::pipeline::types::ProcessingRecord;

/// External database that receives finished processing records.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Store name for logs and the connection test (e.g. "notion").
    fn name(&self) -> &str;

    /// Write one record as a new entry.
    async fn write_record(&self, record: &ProcessingRecord) -> Result<(), SyncError>;

    /// Verify the credentials can reach the store.
    async fn check_connection(&self) -> Result<(), SyncError>;
}
