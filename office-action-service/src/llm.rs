//! Chat-completion adapter for the hosted analysis model.
//!
//! One blocking request per call against an Azure-style deployment, at a
//! fixed sampling temperature. No streaming, no retries, no backoff: a
//! failure is reported to the caller as a typed error and the operator
//! re-triggers the stage. This is the only network I/O in the system.

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

pub const SAMPLING_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

pub const ENDPOINT_VAR: &str = "AZURE_OPENAI_ENDPOINT";
pub const API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
pub const API_VERSION_VAR: &str = "OPENAI_API_VERSION";
pub const DEPLOYMENT_VAR: &str = "AZURE_OPENAI_DEPLOYMENT";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM configuration missing: {0} is not set")]
    ConfigMissing(&'static str),

    #[error("transport failure calling the LLM endpoint: {0}")]
    Transport(String),

    #[error("LLM endpoint rejected the credential (HTTP {status})")]
    Auth { status: u16 },

    #[error("LLM endpoint returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM reply payload was malformed: {0}")]
    MalformedReply(String),

    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
}

impl LlmConfig {
    /// Read the three required settings (plus the optional deployment
    /// override) from the environment.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::read_env().map_err(LlmError::ConfigMissing)
    }

    fn read_env() -> Result<Self, &'static str> {
        let endpoint = std::env::var(ENDPOINT_VAR).map_err(|_| ENDPOINT_VAR)?;
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| API_KEY_VAR)?;
        let api_version = std::env::var(API_VERSION_VAR).map_err(|_| API_VERSION_VAR)?;
        let deployment =
            std::env::var(DEPLOYMENT_VAR).unwrap_or_else(|_| DEFAULT_DEPLOYMENT.to_string());

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version,
            deployment,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

/// Chat-completion client. Built once at startup; a missing setting is
/// remembered and surfaces as a typed failure on the first call rather than
/// stopping the process.
pub struct LlmClient {
    http: reqwest::Client,
    config: Result<LlmConfig, &'static str>,
}

impl LlmClient {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::new(),
            config: LlmConfig::read_env(),
        }
    }

    pub fn with_config(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Ok(config),
        }
    }

    /// The environment variable that was absent at startup, if any.
    pub fn missing_setting(&self) -> Option<&'static str> {
        self.config.as_ref().err().copied()
    }

    /// Submit one system/user message pair and return the raw reply text.
    pub async fn submit(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let cfg = self
            .config
            .as_ref()
            .map_err(|var| LlmError::ConfigMissing(*var))?;

        let payload = json!({
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": SAMPLING_TEMPERATURE,
        });

        let response = self
            .http
            .post(cfg.completions_url())
            .header("api-key", &cfg.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(LlmError::Auth { status });
        }
        if !(200..300).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedReply(e.to_string()))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LlmError::MalformedReply("missing choices[0].message.content".to_string())
            })?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        debug!(chars = content.len(), "LLM reply received");
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_key: "key".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
        }
    }

    #[test]
    fn completions_url_targets_the_deployment() {
        let url = test_config().completions_url();
        assert_eq!(
            url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn configured_client_reports_no_missing_setting() {
        let client = LlmClient::with_config(test_config());
        assert_eq!(client.missing_setting(), None);
    }

    #[test]
    fn error_display_names_the_failure_kind() {
        assert!(
            LlmError::ConfigMissing(API_KEY_VAR)
                .to_string()
                .contains(API_KEY_VAR)
        );
        assert!(LlmError::Auth { status: 401 }.to_string().contains("401"));
        assert!(LlmError::EmptyCompletion.to_string().contains("empty"));
    }
}
