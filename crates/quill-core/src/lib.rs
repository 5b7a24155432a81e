//! quill-core: streaming brochure and code-explanation generation
//!
//! Fetches pages, builds prompts, calls OpenAI-compatible chat-completion
//! endpoints, and aggregates the streamed fragments into cumulative,
//! render-ready snapshots.
//!
//! # Quick Start
//!
//! ```no_run
//! use quill_core::{CollectingSink, GenerateOptions, LoadOptions, Quill, pump};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let quill = Quill::load(LoadOptions::default())?;
//!     let provider = quill.provider(None)?;
//!     let snapshots = quill
//!         .brochure(provider.as_ref(), "Acme", "https://acme.test", &GenerateOptions::default())
//!         .await?;
//!
//!     let mut sink = CollectingSink::new();
//!     pump(snapshots, &mut sink).await?;
//!     println!("{}", sink.displayed());
//!     Ok(())
//! }
//! ```
//!
//! The aggregation stage is usable on its own through [`aggregate()`].

pub mod aggregate;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod provider;
mod quill;
pub mod request;
pub mod sink;
pub mod sse;

// Re-export the facade
pub use quill::{GenerateOptions, LoadOptions, Quill, SnapshotStream};

// Re-export commonly used types
pub use aggregate::{Fragment, RenderSnapshot, StreamOutcome, aggregate, collect_final};
pub use cleanup::{Cleanup, TextCleanup};
pub use config::{Config, KeyCheck, check_api_key};
pub use error::{QuillError, Result};
pub use logging::DebugKey;
pub use provider::{GenerationProvider, ProviderKind};
pub use sink::{CollectingSink, DisplayEvent, DisplaySink, pump};
