pub mod config;
pub mod plan;
pub mod review;

use std::path::Path;

use anyhow::Context;
use sc_agents::CodeAssistant;
use sc_core::config::{Config, CredentialProvider};
use sc_intelligence::ApiKey;

/// Resolve the API key from the environment variable named in the config.
pub fn api_key(config: &Config) -> anyhow::Result<ApiKey> {
    CredentialProvider::api_key(&config.provider)
        .map(ApiKey::from)
        .with_context(|| {
            format!(
                "no API key found; set the {} environment variable",
                config.provider.api_key_env
            )
        })
}

/// Build the assistant and cancel its work on Ctrl-C.
pub fn assistant(config: &Config) -> anyhow::Result<CodeAssistant> {
    let assistant = CodeAssistant::from_config(config)
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    let token = assistant.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        }
    });
    Ok(assistant)
}

pub fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
