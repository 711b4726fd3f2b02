#[cfg(test)]
pub(crate) mod fake;
pub mod gemini;
pub mod ollama;


pub use gemini::GeminiClient;
pub use ollama::OllamaGenerator;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::config::{LlmConfig, LlmProvider, OllamaConfig};

/// A hosted or local text generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` and return the model's text unmodified.
    async fn post_request(&self, prompt: &str) -> Result<String>;

    /// Provider and model, for logging
    fn describe(&self) -> String;
}

/// Build the client for the configured provider.
///
/// The Ollama provider reuses the embedding server's address unless the LLM
/// section overrides it.
#[inline]
pub fn build_language_model(
    llm: &LlmConfig,
    ollama: &OllamaConfig,
) -> Result<Arc<dyn LanguageModel>> {
    let timeout = Duration::from_secs(llm.timeout_seconds);

    match llm.provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(llm)?.with_timeout(timeout))),
        LlmProvider::Ollama => {
            let base_url = match &llm.base_url {
                Some(url) => url.parse::<Url>()?,
                None => ollama.ollama_url()?,
            };
            Ok(Arc::new(
                OllamaGenerator::new(base_url, &llm.model)
                    .with_timeout(timeout)
                    .with_retry_attempts(llm.retry_attempts),
            ))
        }
    }
}
