//! Server-Sent Events decoding for chat-completions streams.
//!
//! Network chunks do not respect line or character boundaries, so bytes are
//! buffered until a full line is available. Each `data:` line carries one JSON
//! chunk whose `choices[0].delta.content` is the next fragment; `data: [DONE]`
//! ends the stream.

use crate::aggregate::Fragment;
use crate::error::{QuillError, Result};
use serde_json::json;

const DONE_MARKER: &str = "[DONE]";

/// Incremental decoder for one response body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a newline.
    scanned: usize,
    done: bool,
    failure: Option<QuillError>,
    response_meta: Option<serde_json::Value>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning the fragments completed by them.
    ///
    /// A line that fails to decode stops the decoder. Fragments from earlier
    /// lines are still returned; the error is kept for [`Self::take_failure`].
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let newline = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.scanned = 0;
            match self.decode_line(&line[..newline]) {
                Ok(Some(fragment)) => fragments.push(fragment),
                Ok(None) => {}
                Err(e) => {
                    self.failure = Some(e);
                    self.done = true;
                }
            }
            if self.done {
                self.buffer.clear();
                return fragments;
            }
        }
        self.scanned = self.buffer.len();
        fragments
    }

    /// The decode error that stopped the decoder, if any.
    pub fn take_failure(&mut self) -> Option<QuillError> {
        self.failure.take()
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Result<Option<Fragment>> {
        if self.done || self.buffer.is_empty() {
            return Ok(None);
        }
        self.scanned = 0;
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    /// Whether decoding has stopped, at `[DONE]` or at a failed line.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Metadata collected from chunks so far (`id`, `model`, `usage`).
    pub fn response_meta(&self) -> Option<&serde_json::Value> {
        self.response_meta.as_ref()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Result<Option<Fragment>> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| QuillError::source_failed("UTF-8 error", e))?;
        let line = line.strip_suffix('\r').unwrap_or(line);

        // Blank separators, comments (": keep-alive"), and non-data fields
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }
        let Some(data) = line.strip_prefix("data:") else {
            if !line.starts_with("event:") && !line.starts_with("id:") {
                log::warn!("ignoring unexpected stream line: {}", line);
            }
            return Ok(None);
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data == DONE_MARKER {
            self.done = true;
            return Ok(None);
        }

        let chunk: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| QuillError::source_failed("JSON parse error", e))?;

        if let Some(error) = chunk.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(QuillError::SourceFailed(format!("API error: {}", message)));
        }

        self.capture_meta(&chunk);

        // A missing or null delta.content is still a (no-op) fragment.
        Ok(chunk["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .map(|choice| {
                choice["delta"]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            }))
    }

    fn capture_meta(&mut self, chunk: &serde_json::Value) {
        if chunk.get("usage").is_none() && chunk.get("model").is_none() && chunk.get("id").is_none()
        {
            return;
        }
        let mut meta = self.response_meta.take().unwrap_or(json!({}));
        for key in ["usage", "model", "id"] {
            if let Some(value) = chunk.get(key)
                && !value.is_null()
            {
                meta[key] = value.clone();
            }
        }
        self.response_meta = Some(meta);
    }
}
