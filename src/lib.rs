//! Mail triage: Gmail classification, reply drafting and Notion logging.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;
