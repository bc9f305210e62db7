//! Uniform access to the remote text and image models.
//!
//! Every provider turns transport, status and payload problems into a
//! [`ClientError`]; nothing is retried and no state survives between
//! calls.

pub mod gemini;
pub mod openrouter;

use crate::core::asset::ImageAsset;
use crate::core::config::{resolve_api_key, Config};
use crate::core::error::ClientError;
use crate::core::plan::Plan;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

pub use gemini::GeminiClient;
pub use openrouter::OpenRouterClient;

/// A schema-constrained planning request.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub system: String,
    pub user: String,
    pub schema_name: String,
    pub schema: Value,
}

#[async_trait]
pub trait GenerativeClient: Send + Sync + Debug {
    /// Asks the text model for a plan that follows `request.schema`.
    async fn request_plan(&self, request: &PlanRequest) -> Result<Plan, ClientError>;

    /// Asks the image model for one image. `references` are attached as
    /// visual context, never as edit targets. Only the first returned
    /// image is used.
    async fn request_image(
        &self,
        prompt: &str,
        references: &[ImageAsset],
    ) -> Result<ImageAsset, ClientError>;
}

pub fn create_client(config: &Config) -> Result<Arc<dyn GenerativeClient>> {
    match config.provider.name.as_str() {
        "openrouter" => {
            let cfg = config.provider.openrouter.clone().unwrap_or_default();
            let api_key = resolve_api_key(cfg.api_key.as_deref(), "OPENROUTER_API_KEY")
                .context("OpenRouter API key missing: set provider.openrouter.api_key or OPENROUTER_API_KEY")?;
            Ok(Arc::new(OpenRouterClient::new(&api_key, &cfg)))
        }
        "gemini" => {
            let cfg = config.provider.gemini.clone().unwrap_or_default();
            let api_key = resolve_api_key(cfg.api_key.as_deref(), "GEMINI_API_KEY")
                .context("Gemini API key missing: set provider.gemini.api_key or GEMINI_API_KEY")?;
            Ok(Arc::new(GeminiClient::new(&api_key, &cfg)))
        }
        other => Err(anyhow!("Unknown provider: {}", other)),
    }
}

/// Reads a response body, turning non-success statuses into
/// [`ClientError::Api`].
pub(crate) async fn read_body(
    provider: &'static str,
    resp: reqwest::Response,
) -> Result<String, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GeminiConfig, OpenRouterConfig};

    #[test]
    fn test_factory_uses_configured_key() {
        let mut config = Config::default();
        config.provider.openrouter = Some(OpenRouterConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        });
        assert!(create_client(&config).is_ok());

        config.provider.name = "gemini".to_string();
        config.provider.gemini = Some(GeminiConfig {
            api_key: Some("g-test".to_string()),
            ..Default::default()
        });
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let mut config = Config::default();
        config.provider.name = "carrier-pigeon".to_string();
        let err = create_client(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
