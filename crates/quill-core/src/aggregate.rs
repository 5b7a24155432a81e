//! Streaming-response aggregation.
//!
//! Turns a live stream of text fragments into a live stream of cumulative,
//! cleaned snapshots: one snapshot per fragment, in arrival order. The
//! aggregation stage performs no I/O and knows nothing about where snapshots
//! end up; see [`crate::sink::pump`] for the display stage.

use crate::cleanup::TextCleanup;
use crate::error::Result;
use futures_util::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// One incremental piece of generated text. May be empty.
pub type Fragment = String;

/// Cumulative, cleaned text after a given fragment.
///
/// Snapshots are immutable; cloning one is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSnapshot {
    index: usize,
    text: Arc<str>,
}

impl RenderSnapshot {
    /// Position (0-based) of the fragment that produced this snapshot.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl AsRef<str> for RenderSnapshot {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RenderSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// How a finished stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The source was exhausted normally.
    Completed,
    /// The source raised an error; the last snapshot before it is retained.
    Failed,
}

/// Lifecycle of one aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Streaming,
    Done(StreamOutcome),
}

/// The single mutable accumulator behind one generation request.
pub struct Aggregator<C> {
    accumulated: String,
    cleanup: C,
    received: usize,
    last: Option<RenderSnapshot>,
    state: AggregatorState,
}

impl<C: TextCleanup> Aggregator<C> {
    pub fn new(cleanup: C) -> Self {
        Self {
            accumulated: String::new(),
            cleanup,
            received: 0,
            last: None,
            state: AggregatorState::Streaming,
        }
    }

    /// Append one fragment and return the snapshot for it.
    ///
    /// Returns `None` once the aggregator is done; the fragment is dropped.
    pub fn push(&mut self, fragment: &str) -> Option<RenderSnapshot> {
        if self.is_done() {
            log::warn!("fragment pushed after aggregation finished; ignoring");
            return None;
        }
        let index = self.received;
        self.received += 1;

        // Cleanup is pure, so an empty fragment cannot change the rendering.
        let text = match &self.last {
            Some(last) if fragment.is_empty() => Arc::clone(&last.text),
            _ => {
                self.accumulated.push_str(fragment);
                Arc::from(self.cleanup.clean(&self.accumulated))
            }
        };

        let snapshot = RenderSnapshot { index, text };
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Raw concatenation of every fragment so far, before cleanup.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn last_snapshot(&self) -> Option<&RenderSnapshot> {
        self.last.as_ref()
    }

    /// Number of fragments received.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn cleanup(&self) -> &C {
        &self.cleanup
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, AggregatorState::Done(_))
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        if !self.is_done() {
            log::debug!(
                "aggregation finished: {:?} after {} fragment(s), {} bytes",
                outcome,
                self.received,
                self.accumulated.len()
            );
            self.state = AggregatorState::Done(outcome);
        }
    }
}

/// Stream adapter returned by [`aggregate`].
///
/// Yields `Ok(snapshot)` per fragment. If the source fails, yields that error
/// once and ends. Once done, the source is never polled again; dropping the
/// adapter drops the source.
pub struct Aggregate<S, C> {
    source: S,
    aggregator: Aggregator<C>,
}

impl<S, C: TextCleanup> Aggregate<S, C> {
    /// The underlying accumulator, e.g. to read the last snapshot after a failure.
    pub fn aggregator(&self) -> &Aggregator<C> {
        &self.aggregator
    }
}

/// Aggregate a fragment stream into a snapshot stream.
///
/// The Nth output is `cleanup(concat(fragments[0..=N]))`.
pub fn aggregate<S, C>(fragments: S, cleanup: C) -> Aggregate<S, C>
where
    S: Stream<Item = Result<Fragment>> + Unpin,
    C: TextCleanup,
{
    Aggregate {
        source: fragments,
        aggregator: Aggregator::new(cleanup),
    }
}

impl<S, C> Stream for Aggregate<S, C>
where
    S: Stream<Item = Result<Fragment>> + Unpin,
    C: TextCleanup + Unpin,
{
    type Item = Result<RenderSnapshot>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.aggregator.is_done() {
            return Poll::Ready(None);
        }

        match this.source.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(this.aggregator.push(&fragment).map(Ok)),
            Poll::Ready(Some(Err(err))) => {
                this.aggregator.finish(StreamOutcome::Failed);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.aggregator.finish(StreamOutcome::Completed);
                Poll::Ready(None)
            }
        }
    }
}

/// Collect a whole fragment stream, returning the final snapshot.
///
/// A source that produced no fragments yields an empty string. Callers that
/// need per-fragment updates use [`aggregate`].
pub async fn collect_final<S, C>(fragments: S, cleanup: C) -> Result<String>
where
    S: Stream<Item = Result<Fragment>> + Unpin,
    C: TextCleanup + Unpin,
{
    let mut stream = aggregate(fragments, cleanup);
    while let Some(item) = stream.next().await {
        item?;
    }
    Ok(stream
        .aggregator()
        .last_snapshot()
        .map(|s| s.text().to_string())
        .unwrap_or_default())
}

impl From<RenderSnapshot> for String {
    fn from(snapshot: RenderSnapshot) -> Self {
        snapshot.text.to_string()
    }
}
