//! CLI argument parsing with clap.
//!
//! This module handles parsing command-line arguments and converting them
//! to the options the core workflows take.

use clap::{Args, Parser, Subcommand};
use quill_core::{Cleanup, DebugKey, GenerateOptions, ProviderKind};
use std::io::{self, ErrorKind, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CLI_AFTER_HELP: &str = "\
PROVIDERS:
  ollama    local model at http://localhost:11434/v1 (no key needed)
  gemini    hosted, key from GOOGLE_API_KEY
  openai    hosted, key from OPENAI_API_KEY

CLEANUP MODES:
  identity        leave the model output untouched
  strip_literals  remove every \"```\" and \"markdown\" (default)
  strip_fences    remove code fences with their language tags

EXAMPLES:
  quill brochure --company \"Hugging Face\" --url https://huggingface.co
  quill explain --provider gemini --file snippet.py
  echo 'print(1)' | quill explain
  quill check-key openai";

/// quill - Stream company brochures and code explanations from LLMs
#[derive(Parser, Debug)]
#[command(
    name = "quill",
    version,
    about = "Stream company brochures and code explanations from LLMs",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    /// Override the quill home directory (default: QUILL_HOME or ~/.quill)
    #[arg(long, value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    /// Show debug diagnostics on stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Emit snapshots as JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs: request-log, response-meta, all
    #[arg(
        long = "debug",
        value_name = "KEY",
        global = true,
        value_delimiter = ',',
        value_parser = parse_debug_key
    )]
    pub debug: Vec<DebugKey>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Write a company brochure from its landing page
    Brochure {
        /// Company name used in the prompt
        #[arg(long, value_name = "NAME")]
        company: String,

        /// Landing page to fetch
        #[arg(long, value_name = "URL")]
        url: String,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Explain a code snippet (from --file, the argument, or stdin)
    Explain {
        /// Read the snippet from a file
        #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "code")]
        file: Option<PathBuf>,

        /// The snippet itself
        code: Option<String>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Check that a provider's API key is present and plausible
    CheckKey {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },
}

/// Flags shared by the generating commands.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerationArgs {
    /// Provider to use (default: from config.toml, else ollama)
    #[arg(short = 'p', long, value_name = "PROVIDER", value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,

    /// Model to request (default: the provider's default model)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Cleanup applied to the streamed text
    #[arg(long, value_name = "MODE", value_parser = parse_cleanup)]
    pub cleanup: Option<Cleanup>,
}

impl GenerationArgs {
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            model: self.model.clone(),
            cleanup: self.cleanup,
        }
    }
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(s).map_err(|e| e.to_string())
}

fn parse_cleanup(s: &str) -> Result<Cleanup, String> {
    Cleanup::from_str(&s.replace('-', "_")).map_err(|_| {
        format!(
            "unknown cleanup '{}' (choose one of: identity, strip_literals, strip_fences)",
            s
        )
    })
}

fn parse_debug_key(s: &str) -> Result<DebugKey, String> {
    DebugKey::parse(s.trim()).ok_or_else(|| {
        format!(
            "unknown debug key '{}' (choose one of: request-log, response-meta, all)",
            s
        )
    })
}

/// Resolve the snippet for `explain`: file, then argument, then stdin.
pub fn read_code(file: Option<&Path>, code: Option<&str>) -> io::Result<String> {
    let code = match (file, code) {
        (Some(path), _) => std::fs::read_to_string(path).map_err(|e| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("Failed to read file '{}': {}", path.display(), e),
            )
        })?,
        (None, Some(code)) => code.to_string(),
        (None, None) => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    "No code given: pass it as an argument, with --file, or on stdin",
                ));
            }
            let mut buf = String::new();
            stdin.lock().read_to_string(&mut buf)?;
            buf
        }
    };

    if code.trim().is_empty() {
        return Err(io::Error::new(ErrorKind::InvalidInput, "No code to explain"));
    }
    Ok(code)
}
