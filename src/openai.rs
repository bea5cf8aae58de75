//! OpenAI-compatible gateway client construction.

use crate::config::GenerationConfig;
use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

/// Split a model identifier into `(provider, model)`.
///
/// `gateway/{provider}:{model}` carries its own provider and wins over the
/// configured one; any other identifier is used verbatim with `provider`.
pub fn resolve_model<'a>(model: &'a str, provider: &'a str) -> (&'a str, &'a str) {
    if let Some(rest) = model.strip_prefix("gateway/") {
        if let Some((inline_provider, name)) = rest.split_once(':') {
            return (inline_provider, name);
        }
        return (provider, rest);
    }
    (provider, model)
}

/// Create a gateway client for the provider the model resolves to.
///
/// The built-in retry of async-openai is switched off: a failed call surfaces
/// immediately.
pub fn create_client(config: &GenerationConfig) -> Result<Client<OpenAIConfig>> {
    let (provider, _) = resolve_model(&config.model, &config.provider);

    let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;

    let api_base = if provider.is_empty() {
        config.gateway_url.clone()
    } else {
        format!("{}/{}", config.gateway_url, provider)
    };

    let openai_config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(config.api_key.clone());

    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Ok(Client::with_config(openai_config)
        .with_http_client(http_client)
        .with_backoff(no_retry))
}
