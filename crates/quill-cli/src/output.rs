//! Output handling for the CLI.
//!
//! `OutputHandler` routes results to stdout and diagnostics to stderr, and
//! picks the display sink that matches the output mode.

use quill_core::{Cleanup, DisplaySink};
use std::io;

use crate::sink::{JsonSink, TerminalSink};

/// CLI output handler: results to stdout, diagnostics to stderr.
#[derive(Default)]
pub struct OutputHandler {
    json: bool,
    verbose: bool,
}

impl OutputHandler {
    pub fn new(json: bool, verbose: bool) -> Self {
        Self { json, verbose }
    }

    /// Print a one-off result.
    pub fn emit_result(&self, content: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "type": "result", "message": content }));
        } else {
            println!("{}", content);
        }
    }

    /// Print a diagnostic when verbose.
    pub fn diagnostic(&self, message: &str) {
        if self.verbose {
            eprintln!("{}", message);
        }
    }

    /// Display sink for streamed snapshots on stdout.
    pub fn display_sink(&self, cleanup: Cleanup) -> Box<dyn DisplaySink> {
        if self.json {
            Box::new(JsonSink::new(io::stdout()))
        } else {
            Box::new(TerminalSink::new(io::stdout(), cleanup))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_text_mode() {
        let handler = OutputHandler::default();
        assert!(!handler.json);
        assert!(!handler.verbose);
    }

    #[test]
    fn test_diagnostics_do_not_panic() {
        let handler = OutputHandler::new(false, false);
        // Suppressed: not verbose
        handler.diagnostic("hidden");
        OutputHandler::new(false, true).diagnostic("shown");
    }
}
