//! CLI display sinks for streamed snapshots.
//!
//! Snapshots are cumulative, but a terminal can only append. `TerminalSink`
//! prints the part of each snapshot that extends what is already on screen,
//! holding back a tail that could still turn into a stripped marker.
//! `JsonSink` emits one JSON object per event.

use quill_core::{Cleanup, DisplayEvent, DisplaySink};
use serde_json::json;
use std::io::{self, Write};

/// Appended below the partial output when a generation fails.
const INTERRUPTED: &str = "[generation interrupted]";

/// Append-only text display.
pub struct TerminalSink<W: Write> {
    out: W,
    cleanup: Cleanup,
    /// Exactly the text written so far.
    printed: String,
    /// Latest snapshot received.
    latest: String,
    /// A snapshot no longer extended the printed text.
    retracted: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, cleanup: Cleanup) -> Self {
        Self {
            out,
            cleanup,
            printed: String::new(),
            latest: String::new(),
            retracted: false,
        }
    }

    /// Append `text[printed..]` if `text` extends what is on screen.
    fn extend_to(&mut self, text: &str) -> io::Result<()> {
        if self.retracted {
            return Ok(());
        }
        match text.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                if !suffix.is_empty() {
                    self.out.write_all(suffix.as_bytes())?;
                    self.out.flush()?;
                    self.printed.push_str(suffix);
                }
            }
            None => {
                log::debug!("snapshot retracted displayed text; reprinting at the end");
                self.retracted = true;
            }
        }
        Ok(())
    }

    /// Bring the screen in line with the latest snapshot and end the line.
    fn settle(&mut self) -> io::Result<()> {
        let latest = std::mem::take(&mut self.latest);
        if self.retracted {
            writeln!(self.out)?;
            writeln!(self.out, "---")?;
            self.out.write_all(latest.as_bytes())?;
            self.printed = latest;
        } else {
            self.extend_to(&latest)?;
        }
        if !self.printed.is_empty() && !self.printed.ends_with('\n') {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn handle(&mut self, event: DisplayEvent<'_>) -> io::Result<()> {
        match event {
            DisplayEvent::Snapshot(snapshot) => {
                let text = snapshot.text();
                // Markers are ASCII, so the cut lands on a char boundary.
                let stable = text.len() - self.cleanup.unstable_suffix_len(text);
                self.extend_to(&text[..stable])?;
                self.latest.clear();
                self.latest.push_str(text);
            }
            DisplayEvent::Failed { .. } => {
                self.settle()?;
                writeln!(self.out, "{}", INTERRUPTED)?;
                self.out.flush()?;
            }
            DisplayEvent::Finished => self.settle()?,
        }
        Ok(())
    }
}

/// JSON-lines display: one object per event.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> DisplaySink for JsonSink<W> {
    fn handle(&mut self, event: DisplayEvent<'_>) -> io::Result<()> {
        let line = match event {
            DisplayEvent::Snapshot(snapshot) => json!({
                "type": "snapshot",
                "index": snapshot.index(),
                "text": snapshot.text(),
            }),
            DisplayEvent::Failed { message } => json!({ "type": "error", "message": message }),
            DisplayEvent::Finished => json!({ "type": "finished" }),
        };
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use quill_core::{Fragment, QuillError, aggregate, pump};

    /// Run `fragments` through aggregation into `sink`.
    async fn drive(
        fragments: Vec<quill_core::Result<Fragment>>,
        cleanup: Cleanup,
        sink: &mut dyn DisplaySink,
    ) {
        let _ = pump(aggregate(stream::iter(fragments), cleanup), sink).await;
    }

    fn ok(parts: &[&str]) -> Vec<quill_core::Result<Fragment>> {
        parts.iter().map(|p| Ok(p.to_string())).collect()
    }

    #[tokio::test]
    async fn test_terminal_appends_suffixes() {
        let mut sink = TerminalSink::new(Vec::new(), Cleanup::Identity);
        drive(ok(&["Hel", "lo", " world"]), Cleanup::Identity, &mut sink).await;
        assert_eq!(String::from_utf8(sink.out).unwrap(), "Hello world\n");
    }

    #[tokio::test]
    async fn test_terminal_holds_back_partial_marker() {
        let mut sink = TerminalSink::new(Vec::new(), Cleanup::StripLiterals);
        sink.handle(DisplayEvent::Snapshot(&snapshot(&["# Intro\n``"])))
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&sink.out), "# Intro\n");

        let mut sink = TerminalSink::new(Vec::new(), Cleanup::StripLiterals);
        drive(
            ok(&["# Intro\n``", "`markdown\nBody", "\n``", "`"]),
            Cleanup::StripLiterals,
            &mut sink,
        )
        .await;
        assert_eq!(String::from_utf8(sink.out).unwrap(), "# Intro\n\nBody\n");
    }

    #[tokio::test]
    async fn test_terminal_flushes_held_back_text_at_end() {
        let mut sink = TerminalSink::new(Vec::new(), Cleanup::StripLiterals);
        drive(ok(&["see the mark"]), Cleanup::StripLiterals, &mut sink).await;
        assert_eq!(String::from_utf8(sink.out).unwrap(), "see the mark\n");
    }

    #[tokio::test]
    async fn test_terminal_reprints_after_retraction() {
        let cleanup = |s: &str| if s.len() > 3 { s[..2].to_string() } else { s.to_string() };
        let mut sink = TerminalSink::new(Vec::new(), Cleanup::Identity);
        let snapshots = aggregate(stream::iter(ok(&["abc", "d"])), cleanup);
        pump(snapshots, &mut sink).await.unwrap();
        assert_eq!(String::from_utf8(sink.out).unwrap(), "abc\n---\nab\n");
    }

    #[tokio::test]
    async fn test_terminal_failure_keeps_partial_output() {
        let mut sink = TerminalSink::new(Vec::new(), Cleanup::Identity);
        let mut fragments = ok(&["partial"]);
        fragments.push(Err(QuillError::SourceFailed("quota".into())));
        drive(fragments, Cleanup::Identity, &mut sink).await;
        assert_eq!(
            String::from_utf8(sink.out).unwrap(),
            format!("partial\n{}\n", INTERRUPTED)
        );
    }

    #[tokio::test]
    async fn test_json_lines() {
        let mut sink = JsonSink::new(Vec::new());
        let mut fragments = ok(&["A", "B"]);
        fragments.push(Err(QuillError::SourceFailed("quota".into())));
        drive(fragments, Cleanup::Identity, &mut sink).await;

        let out = String::from_utf8(sink.out).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "snapshot");
        assert_eq!(lines[0]["index"], 0);
        assert_eq!(lines[1]["text"], "AB");
        assert_eq!(lines[2]["type"], "error");
        assert!(lines[2]["message"].as_str().unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn test_json_finished() {
        let mut sink = JsonSink::new(Vec::new());
        drive(ok(&["x"]), Cleanup::Identity, &mut sink).await;
        let out = String::from_utf8(sink.out).unwrap();
        assert_eq!(out.lines().last(), Some(r#"{"type":"finished"}"#));
    }

    fn snapshot(parts: &[&str]) -> quill_core::RenderSnapshot {
        let mut aggregator = quill_core::aggregate::Aggregator::new(Cleanup::Identity);
        let mut last = None;
        for part in parts {
            last = aggregator.push(part);
        }
        last.unwrap()
    }
}
