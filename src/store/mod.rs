//! Workflow store: where finished records are logged for human follow-up.

pub mod notion;
pub mod traits;

pub use notion::NotionClient;
pub use traits::WorkflowStore;
