//! Generation providers.
//!
//! Both providers speak the same OpenAI-compatible chat-completions protocol
//! and expose one capability, [`GenerationProvider::stream_generate`]. They
//! differ in where they run and how they authenticate.

use crate::config::{Config, ProviderConfig};
use crate::error::{QuillError, Result};
use crate::llm::{FragmentStream, StreamingCall, streaming_fragments};
use crate::logging::DebugLogger;
use crate::request::{GenerationRequest, build_request_body};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which backend serves a generation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    /// Locally hosted model served by Ollama.
    Ollama,
    /// Google Gemini through its OpenAI-compatible endpoint.
    Gemini,
    /// OpenAI's hosted models.
    OpenAi,
}

impl ProviderKind {
    /// Parse a provider name, failing with `InvalidSelection` for anything unknown.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name.trim()).map_err(|_| {
            let known: Vec<&'static str> = Self::iter().map(|k| k.name()).collect();
            QuillError::InvalidSelection(format!(
                "unknown provider '{}' (choose one of: {})",
                name,
                known.join(", ")
            ))
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }

    /// Environment variable consulted for this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => None,
            ProviderKind::Gemini => Some("GOOGLE_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        }
    }

    /// Prefix that keys issued by this provider are expected to carry.
    pub fn api_key_prefix(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("sk-proj-"),
            ProviderKind::Ollama | ProviderKind::Gemini => None,
        }
    }

    /// The provider's name for logs, as a `'static` string.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A streaming chat-completions backend.
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn settings(&self) -> &ProviderConfig;

    /// Start a generation. The returned stream is lazy: nothing is sent
    /// until it is first polled, and dropping it releases the connection.
    fn stream_generate(&self, request: &GenerationRequest) -> FragmentStream;

    /// Resolve the model to use, rejecting ones this provider is not
    /// configured for. Never touches the network.
    fn resolve_model(&self, requested: Option<&str>) -> Result<String> {
        let settings = self.settings();
        let model = requested.unwrap_or(&settings.default_model);
        if settings.accepts_model(model) {
            Ok(model.to_string())
        } else {
            Err(QuillError::InvalidSelection(format!(
                "model '{}' is not available for {} (configured: {})",
                model,
                self.kind(),
                settings.models.join(", ")
            )))
        }
    }
}

fn build_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| QuillError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Model served locally by Ollama. No real credentials involved.
pub struct LocalProvider {
    settings: ProviderConfig,
    client: Client,
    logger: DebugLogger,
}

impl LocalProvider {
    pub fn new(
        settings: ProviderConfig,
        timeout_seconds: u64,
        logger: DebugLogger,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            client: build_client(timeout_seconds)?,
            logger,
        })
    }
}

impl GenerationProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn settings(&self) -> &ProviderConfig {
        &self.settings
    }

    fn stream_generate(&self, request: &GenerationRequest) -> FragmentStream {
        let api_key = self
            .settings
            .api_key
            .clone()
            .unwrap_or_else(|| crate::config::OLLAMA_PLACEHOLDER_KEY.to_string());
        streaming_fragments(StreamingCall {
            client: self.client.clone(),
            url: self.settings.chat_completions_url(),
            api_key,
            body: build_request_body(request),
            provider: self.kind().name(),
            logger: self.logger.clone(),
        })
    }
}

/// Remotely hosted model behind a bearer key.
pub struct HostedProvider {
    kind: ProviderKind,
    settings: ProviderConfig,
    api_key: String,
    client: Client,
    logger: DebugLogger,
}

impl HostedProvider {
    /// Fails with `Config` when no API key is configured.
    pub fn new(
        kind: ProviderKind,
        settings: ProviderConfig,
        timeout_seconds: u64,
        logger: DebugLogger,
    ) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                QuillError::Config(format!(
                    "no API key configured for {}{}",
                    kind,
                    kind.api_key_env()
                        .map(|var| format!(" (set {})", var))
                        .unwrap_or_default()
                ))
            })?;
        Ok(Self {
            kind,
            settings,
            api_key,
            client: build_client(timeout_seconds)?,
            logger,
        })
    }
}

impl GenerationProvider for HostedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn settings(&self) -> &ProviderConfig {
        &self.settings
    }

    fn stream_generate(&self, request: &GenerationRequest) -> FragmentStream {
        streaming_fragments(StreamingCall {
            client: self.client.clone(),
            url: self.settings.chat_completions_url(),
            api_key: self.api_key.clone(),
            body: build_request_body(request),
            provider: self.kind.name(),
            logger: self.logger.clone(),
        })
    }
}

/// Construct the provider for `kind` from explicit configuration.
pub fn select_provider(
    config: &Config,
    kind: ProviderKind,
    logger: DebugLogger,
) -> Result<Box<dyn GenerationProvider>> {
    let settings = config.provider(kind).clone();
    let timeout = config.request_timeout_seconds;
    Ok(match kind {
        ProviderKind::Ollama => Box::new(LocalProvider::new(settings, timeout, logger)?),
        ProviderKind::Gemini | ProviderKind::OpenAi => {
            Box::new(HostedProvider::new(kind, settings, timeout, logger)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use std::path::PathBuf;

    fn config_with_env(env: &'static [(&'static str, &'static str)]) -> Config {
        Config::resolve(PathBuf::from("/tmp/quill-test"), &ConfigFile::default(), |name| {
            env.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn test_parse_known_providers() {
        assert_eq!(ProviderKind::parse("ollama").unwrap(), ProviderKind::Ollama);
        assert_eq!(ProviderKind::parse(" gemini ").unwrap(), ProviderKind::Gemini);
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
    }

    #[test]
    fn test_parse_unknown_provider() {
        let err = ProviderKind::parse("claude").unwrap_err();
        match err {
            QuillError::InvalidSelection(msg) => {
                assert!(msg.contains("claude"));
                assert!(msg.contains("ollama, gemini, openai"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_display_matches_name() {
        for kind in ProviderKind::iter() {
            assert_eq!(kind.to_string(), kind.name());
        }
    }

    #[test]
    fn test_select_local_needs_no_key() {
        let config = config_with_env(&[]);
        let provider = select_provider(&config, ProviderKind::Ollama, DebugLogger::disabled())
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::Ollama);
        assert_eq!(provider.resolve_model(None).unwrap(), "llama3.2");
    }

    #[test]
    fn test_select_hosted_without_key_fails() {
        let config = config_with_env(&[]);
        let err = select_provider(&config, ProviderKind::Gemini, DebugLogger::disabled())
            .err()
            .unwrap();
        assert!(matches!(err, QuillError::Config(ref m) if m.contains("GOOGLE_API_KEY")));
    }

    #[test]
    fn test_select_hosted_with_env_key() {
        let config = config_with_env(&[("OPENAI_API_KEY", "sk-proj-test")]);
        let provider = select_provider(&config, ProviderKind::OpenAi, DebugLogger::disabled())
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
        assert_eq!(provider.resolve_model(Some("gpt-4o-mini")).unwrap(), "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_model_rejects_unknown() {
        let config = config_with_env(&[("OPENAI_API_KEY", "sk-proj-test")]);
        let provider = select_provider(&config, ProviderKind::OpenAi, DebugLogger::disabled())
            .unwrap();
        let err = provider.resolve_model(Some("gpt-5000")).unwrap_err();
        assert!(matches!(err, QuillError::InvalidSelection(ref m) if m.contains("gpt-5000")));
    }
}
