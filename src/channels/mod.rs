//! Mailbox channels.

pub mod auth;
pub mod gmail;
pub mod gmail_types;

pub use gmail::GmailClient;
