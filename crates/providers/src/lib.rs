//! Model provider implementations for Deckr.
//!
//! All providers implement the `deckr_core::Provider` trait.
//! [`build_from_config`] selects the backend named in configuration.

pub mod gemini;
pub mod retry;

pub use gemini::GeminiProvider;
pub use retry::{RetryPolicy, with_retry};

use deckr_core::error::ProviderError;
use deckr_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
pub fn build_from_config(
    config: &deckr_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match config.provider.kind.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "no API key (set DECKR_API_KEY or GEMINI_API_KEY, or api_key in config.toml)"
                        .into(),
                )
            })?;
            let mut provider = GeminiProvider::new(api_key)?;
            if let Some(url) = &config.provider.api_url {
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::NotConfigured(format!(
            "unknown provider kind '{other}'"
        ))),
    }
}
