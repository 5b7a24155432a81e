//! High-level facade for embedding quill.
//!
//! `Quill` owns the resolved configuration, the debug logger and the content
//! fetcher, and wires them into the two workflows. Each workflow returns a
//! lazy snapshot stream; nothing is sent to the model until it is polled.
//!
//! # Example
//!
//! ```no_run
//! use quill_core::{CollectingSink, GenerateOptions, LoadOptions, Quill, pump};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let quill = Quill::load(LoadOptions::default())?;
//!     let provider = quill.provider(None)?;
//!
//!     let snapshots = quill.explain(provider.as_ref(), "print(1)", &GenerateOptions::default())?;
//!     let mut sink = CollectingSink::new();
//!     pump(snapshots, &mut sink).await?;
//!
//!     println!("{}", sink.displayed());
//!     Ok(())
//! }
//! ```

use crate::aggregate::{Aggregate, aggregate};
use crate::cleanup::Cleanup;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{ContentFetcher, HttpFetcher};
use crate::llm::FragmentStream;
use crate::logging::{DebugKey, DebugLogger};
use crate::prompt::{brochure_messages, explain_messages};
use crate::provider::{GenerationProvider, ProviderKind, select_provider};
use crate::request::{ChatMessage, GenerationRequest};
use std::path::PathBuf;

/// Snapshots produced by a workflow.
pub type SnapshotStream = Aggregate<FragmentStream, Cleanup>;

/// Options for loading a Quill instance.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Override the quill home directory.
    /// If `None`, uses `QUILL_HOME` env var or `~/.quill`.
    pub home: Option<PathBuf>,
    /// Debug logs to write under `{home}/logs`.
    pub debug: Vec<DebugKey>,
}

/// Per-invocation choices layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Model to request; the provider's default when `None`.
    pub model: Option<String>,
    /// Cleanup transform; the workflow's configured one when `None`.
    pub cleanup: Option<Cleanup>,
}

/// High-level facade over configuration, fetching and generation.
pub struct Quill {
    pub config: Config,
    logger: DebugLogger,
    fetcher: Box<dyn ContentFetcher>,
}

impl Quill {
    /// Load configuration from disk and the environment.
    pub fn load(options: LoadOptions) -> Result<Self> {
        let config = Config::load(options.home)?;
        Self::from_config(config, options.debug)
    }

    /// Build from an already resolved configuration, fetching over HTTP.
    pub fn from_config(config: Config, debug: Vec<DebugKey>) -> Result<Self> {
        let logger = if debug.is_empty() {
            DebugLogger::disabled()
        } else {
            DebugLogger::new(config.log_dir(), debug)
        };
        Ok(Self {
            config,
            logger,
            fetcher: Box::new(HttpFetcher::new()?),
        })
    }

    /// Replace the content fetcher.
    pub fn with_fetcher(mut self, fetcher: Box<dyn ContentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Construct the provider for `kind`, or the configured default.
    pub fn provider(&self, kind: Option<ProviderKind>) -> Result<Box<dyn GenerationProvider>> {
        let kind = kind.unwrap_or(self.config.default_provider);
        select_provider(&self.config, kind, self.logger.clone())
    }

    /// Fetch `url` and stream a brochure about `company`.
    ///
    /// The model is validated before the page is fetched; a fetch failure is
    /// returned here, before any generation starts.
    pub async fn brochure(
        &self,
        provider: &dyn GenerationProvider,
        company: &str,
        url: &str,
        options: &GenerateOptions,
    ) -> Result<SnapshotStream> {
        let model = provider.resolve_model(options.model.as_deref())?;
        let website = self.fetcher.fetch(url).await?;
        let cleanup = options.cleanup.unwrap_or(self.config.brochure_cleanup);
        let messages = brochure_messages(company, &website);
        Ok(self.generate(provider, model, messages, cleanup))
    }

    /// Stream an explanation of `code`.
    pub fn explain(
        &self,
        provider: &dyn GenerationProvider,
        code: &str,
        options: &GenerateOptions,
    ) -> Result<SnapshotStream> {
        let model = provider.resolve_model(options.model.as_deref())?;
        let cleanup = options.cleanup.unwrap_or(self.config.explain_cleanup);
        Ok(self.generate(provider, model, explain_messages(code), cleanup))
    }

    fn generate(
        &self,
        provider: &dyn GenerationProvider,
        model: String,
        messages: Vec<ChatMessage>,
        cleanup: Cleanup,
    ) -> SnapshotStream {
        let mut request = GenerationRequest::streaming(model, messages)
            .with_usage(self.logger.is_enabled(DebugKey::ResponseMeta));
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        log::debug!(
            "starting generation with {} model {}",
            provider.kind(),
            request.model
        );
        aggregate(provider.stream_generate(&request), cleanup)
    }
}
