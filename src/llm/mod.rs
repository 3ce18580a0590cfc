//! LLM integration for mail-triage.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait. The provider is
//! wrapped in a `RetryProvider` so rate-limited calls back off and retry.

pub mod costs;
pub mod provider;
pub mod retry;
mod rig_adapter;

pub use provider::*;
pub use retry::RetryProvider;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::AiConfig;
use crate::error::LlmError;

/// Create the OpenAI-backed provider described by `config`.
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);

    let adapter: Arc<dyn LlmProvider> = Arc::new(RigAdapter::new(model, &config.model, "openai"));
    Ok(Arc::new(RetryProvider::new(adapter, config.max_retries)))
}
