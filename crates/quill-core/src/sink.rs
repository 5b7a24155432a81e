//! Display sink abstraction for decoupling generation from presentation.
//!
//! This module defines the `DisplaySink` trait that receives render snapshots
//! without the aggregation stage knowing whether they end up in a terminal,
//! a JSON stream, or a test buffer. [`pump`] connects the two stages.

use crate::aggregate::RenderSnapshot;
use crate::error::Result;
use futures_util::stream::{Stream, StreamExt};
use std::io;

/// Events delivered to a display.
#[derive(Debug, Clone)]
pub enum DisplayEvent<'a> {
    /// The newest cumulative snapshot; replaces whatever was shown before.
    Snapshot(&'a RenderSnapshot),

    /// The generation failed. The previous snapshot should stay visible.
    Failed { message: String },

    /// The generation completed normally.
    Finished,
}

/// Trait for rendering generation progress.
///
/// # Example
///
/// ```
/// use quill_core::sink::{DisplayEvent, DisplaySink};
/// use std::io;
///
/// struct LastLine(String);
///
/// impl DisplaySink for LastLine {
///     fn handle(&mut self, event: DisplayEvent<'_>) -> io::Result<()> {
///         if let DisplayEvent::Snapshot(snapshot) = event {
///             self.0 = snapshot.text().to_string();
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait DisplaySink {
    fn handle(&mut self, event: DisplayEvent<'_>) -> io::Result<()>;
}

/// A sink that keeps every snapshot, for programmatic use and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub snapshots: Vec<RenderSnapshot>,
    pub error: Option<String>,
    pub finished: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text currently on display.
    pub fn displayed(&self) -> &str {
        self.snapshots.last().map(|s| s.text()).unwrap_or_default()
    }
}

impl DisplaySink for CollectingSink {
    fn handle(&mut self, event: DisplayEvent<'_>) -> io::Result<()> {
        match event {
            DisplayEvent::Snapshot(snapshot) => self.snapshots.push(snapshot.clone()),
            DisplayEvent::Failed { message } => self.error = Some(message),
            DisplayEvent::Finished => self.finished = true,
        }
        Ok(())
    }
}

/// Push every snapshot from `snapshots` into `sink`.
///
/// Returns the last snapshot shown. A source error is reported to the sink
/// as `Failed` and then returned; a sink error stops consumption at once,
/// which drops the source and releases its connection.
pub async fn pump<S>(mut snapshots: S, sink: &mut dyn DisplaySink) -> Result<Option<RenderSnapshot>>
where
    S: Stream<Item = Result<RenderSnapshot>> + Unpin,
{
    let mut last = None;
    while let Some(item) = snapshots.next().await {
        match item {
            Ok(snapshot) => {
                sink.handle(DisplayEvent::Snapshot(&snapshot))?;
                last = Some(snapshot);
            }
            Err(err) => {
                let shown = last.as_ref().map_or(0, |s: &RenderSnapshot| s.index() + 1);
                log::debug!("generation failed after {} snapshot(s): {}", shown, err);
                sink.handle(DisplayEvent::Failed {
                    message: err.to_string(),
                })?;
                return Err(err);
            }
        }
    }
    sink.handle(DisplayEvent::Finished)?;
    Ok(last)
}
