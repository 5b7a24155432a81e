//! Configuration for quill.
//!
//! `config.toml` in the quill home is optional; every field has a default.
//! The file form ([`ConfigFile`]) only carries overrides, and is resolved
//! together with the environment into an immutable [`Config`] once at startup.
//! Providers receive the resolved values explicitly.

use crate::cleanup::Cleanup;
use crate::error::{QuillError, Result};
use crate::provider::ProviderKind;
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_DIR: &str = "logs";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Ollama ignores the key, but OpenAI-compatible clients must send one.
pub const OLLAMA_PLACEHOLDER_KEY: &str = "ollama";

/// Per-provider overrides as written in `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Models accepted for this provider. An empty list accepts any model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Cleanup for brochures; the page text is shown as generated.
    #[serde(default = "default_brochure_cleanup")]
    pub brochure_cleanup: Cleanup,
    /// Cleanup for code explanations; strips the markdown wrapper.
    #[serde(default = "default_explain_cleanup")]
    pub explain_cleanup: Cleanup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub ollama: ProviderOverrides,
    #[serde(default)]
    pub gemini: ProviderOverrides,
    #[serde(default)]
    pub openai: ProviderOverrides,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            request_timeout_seconds: default_request_timeout_seconds(),
            brochure_cleanup: default_brochure_cleanup(),
            explain_cleanup: default_explain_cleanup(),
            temperature: None,
            ollama: ProviderOverrides::default(),
            gemini: ProviderOverrides::default(),
            openai: ProviderOverrides::default(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_request_timeout_seconds() -> u64 {
    120
}

fn default_brochure_cleanup() -> Cleanup {
    Cleanup::Identity
}

fn default_explain_cleanup() -> Cleanup {
    Cleanup::StripLiterals
}

/// Fully resolved settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<String>,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Built-in defaults for `kind`, before file and environment overrides.
    pub fn builtin(kind: ProviderKind) -> Self {
        let (base_url, model, api_key) = match kind {
            ProviderKind::Ollama => (
                DEFAULT_OLLAMA_URL,
                "llama3.2",
                Some(OLLAMA_PLACEHOLDER_KEY.to_string()),
            ),
            ProviderKind::Gemini => (DEFAULT_GEMINI_URL, "gemini-1.5-flash", None),
            ProviderKind::OpenAi => (DEFAULT_OPENAI_URL, "gpt-4o-mini", None),
        };
        Self {
            base_url: base_url.to_string(),
            default_model: model.to_string(),
            models: vec![model.to_string()],
            api_key,
        }
    }

    fn with_overrides(mut self, overrides: &ProviderOverrides) -> Self {
        if let Some(ref v) = overrides.base_url {
            self.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(ref v) = overrides.default_model {
            self.default_model = v.clone();
        }
        if let Some(ref v) = overrides.models {
            self.models = v.clone();
        }
        if let Some(ref v) = overrides.api_key {
            self.api_key = Some(v.clone());
        }
        // The default model is always requestable.
        if !self.accepts_model(&self.default_model) {
            self.models.push(self.default_model.clone());
        }
        self
    }

    /// Whether `model` may be requested from this provider.
    pub fn accepts_model(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }

    /// The chat-completions endpoint under `base_url`.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Immutable configuration for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// The quill home directory (config file and debug logs).
    pub home: PathBuf,
    pub default_provider: ProviderKind,
    pub request_timeout_seconds: u64,
    pub brochure_cleanup: Cleanup,
    pub explain_cleanup: Cleanup,
    pub temperature: Option<f32>,
    pub ollama: ProviderConfig,
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
}

impl Config {
    /// Load configuration from the quill home and the process environment.
    ///
    /// Precedence for the home directory:
    /// 1. `home_override` parameter (from --home CLI flag)
    /// 2. `QUILL_HOME` environment variable
    /// 3. `~/.quill` default
    pub fn load(home_override: Option<PathBuf>) -> Result<Self> {
        let home = resolve_home(home_override)?;
        Self::load_from_dir(&home, |name| std::env::var(name).ok())
    }

    /// Load `config.toml` from `home` (if present), taking API keys from `env`.
    pub fn load_from_dir(home: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = home.join(CONFIG_FILE);
        let file: ConfigFile = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| {
                QuillError::Config(format!("Failed to read {}: {}", config_path.display(), e))
            })?;
            toml::from_str(&content)
                .map_err(|e| QuillError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            ConfigFile::default()
        };
        Ok(Self::resolve(home.to_path_buf(), &file, env))
    }

    /// Merge built-in defaults, file overrides and environment keys.
    pub fn resolve(home: PathBuf, file: &ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let provider = |kind: ProviderKind, overrides: &ProviderOverrides| {
            let mut resolved = ProviderConfig::builtin(kind).with_overrides(overrides);
            if overrides.api_key.is_none()
                && let Some(var) = kind.api_key_env()
            {
                resolved.api_key = env(var).or(resolved.api_key);
            }
            resolved
        };

        Self {
            home,
            default_provider: file.default_provider,
            request_timeout_seconds: file.request_timeout_seconds,
            brochure_cleanup: file.brochure_cleanup,
            explain_cleanup: file.explain_cleanup,
            temperature: file.temperature,
            ollama: provider(ProviderKind::Ollama, &file.ollama),
            gemini: provider(ProviderKind::Gemini, &file.gemini),
            openai: provider(ProviderKind::OpenAi, &file.openai),
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Ollama => &self.ollama,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join(LOG_DIR)
    }
}

/// Resolve the quill home: explicit path > `QUILL_HOME` env > `~/.quill`.
pub fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = home_override {
        return Ok(path);
    }
    if let Ok(quill_home) = std::env::var("QUILL_HOME") {
        return Ok(PathBuf::from(quill_home));
    }
    let home =
        home_dir().ok_or_else(|| QuillError::Config("Home directory not found".to_string()))?;
    Ok(home.join(".quill"))
}

/// Outcome of a sanity check on an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Ok,
    Missing,
    /// The key does not start with the prefix the provider issues.
    UnexpectedPrefix(&'static str),
    /// Leading or trailing spaces/tabs, usually a copy-paste accident.
    SurroundingWhitespace,
}

impl KeyCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, KeyCheck::Ok)
    }

    pub fn message(&self, kind: ProviderKind) -> String {
        match self {
            KeyCheck::Ok => format!("API key for {} found and looks good so far!", kind),
            KeyCheck::Missing => match kind.api_key_env() {
                Some(var) => format!(
                    "No API key was found for {} - set {} or api_key in the [{}] table of config.toml",
                    kind, var, kind
                ),
                None => format!("No API key was found for {}", kind),
            },
            KeyCheck::UnexpectedPrefix(prefix) => format!(
                "An API key for {} was found, but it doesn't start {}; please check you're using the right key",
                kind, prefix
            ),
            KeyCheck::SurroundingWhitespace => format!(
                "An API key for {} was found, but it looks like it might have space or tab characters at the start or end - please remove them",
                kind
            ),
        }
    }
}

/// Check a provider's API key for the usual mistakes.
pub fn check_api_key(kind: ProviderKind, key: Option<&str>) -> KeyCheck {
    if kind.is_local() {
        return KeyCheck::Ok;
    }
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return KeyCheck::Missing;
    };
    if let Some(prefix) = kind.api_key_prefix()
        && !key.starts_with(prefix)
    {
        return KeyCheck::UnexpectedPrefix(prefix);
    }
    if key.trim() != key {
        return KeyCheck::SurroundingWhitespace;
    }
    KeyCheck::Ok
}
