//! Low-level LLM API communication.
//!
//! This module sends chat-completions requests to OpenAI-compatible
//! endpoints and turns the streaming body into a lazy fragment stream.

use crate::aggregate::Fragment;
use crate::error::{QuillError, Result};
use crate::logging::DebugLogger;
use crate::sse::SseDecoder;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::collections::VecDeque;
use uuid::Uuid;

/// Lazy, owned stream of fragments from one generation call.
pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// Everything needed to issue one streaming call.
#[derive(Debug, Clone)]
pub struct StreamingCall {
    pub client: Client,
    /// Full chat-completions URL.
    pub url: String,
    pub api_key: String,
    pub body: serde_json::Value,
    /// Provider name, for logs only.
    pub provider: &'static str,
    pub logger: DebugLogger,
}

/// Send a streaming request to the LLM API.
///
/// Returns the response once headers arrive; non-success statuses become
/// `SourceFailed` carrying the body text.
pub async fn send_streaming_request(call: &StreamingCall) -> Result<reqwest::Response> {
    let response = call
        .client
        .post(&call.url)
        .header(AUTHORIZATION, format!("Bearer {}", call.api_key))
        .header(CONTENT_TYPE, "application/json")
        .body(call.body.to_string())
        .send()
        .await
        .map_err(|e| QuillError::source_failed("Failed to send request", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(QuillError::SourceFailed(format!(
            "API error ({}): {}",
            status, body
        )));
    }

    Ok(response)
}

enum Phase {
    /// Nothing sent yet; the request goes out on first poll.
    Pending(StreamingCall),
    Body {
        body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
        logger: DebugLogger,
    },
    Finished,
}

struct StreamState {
    phase: Phase,
    decoder: SseDecoder,
    ready: VecDeque<Fragment>,
    /// Source error held back until `ready` drains.
    failure: Option<QuillError>,
    request_id: Uuid,
}

impl StreamState {
    /// Record whatever metadata was collected once the body is released.
    fn log_meta(&self, logger: &DebugLogger) {
        if let Some(meta) = self.decoder.response_meta() {
            logger.log_response_meta(self.request_id, meta);
        }
    }
}

/// Build the lazy fragment stream for `call`.
///
/// No network I/O happens until the stream is first polled. Dropping the
/// stream drops the response body and releases the connection; once the
/// `[DONE]` marker arrives the body is released without reading further.
pub fn streaming_fragments(call: StreamingCall) -> FragmentStream {
    let state = StreamState {
        phase: Phase::Pending(call),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        failure: None,
        request_id: Uuid::new_v4(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if let Some(e) = state.failure.take() {
                return Some((Err(e), state));
            }

            // Phase is put back explicitly; leaving it as Finished releases the body.
            match std::mem::replace(&mut state.phase, Phase::Finished) {
                Phase::Finished => return None,
                Phase::Pending(call) => {
                    call.logger
                        .log_request(state.request_id, call.provider, &call.url, &call.body);
                    log::debug!(
                        "{}: POST {} (model {})",
                        call.provider,
                        call.url,
                        call.body["model"]
                    );

                    match send_streaming_request(&call).await {
                        Ok(response) => {
                            state.phase = Phase::Body {
                                body: response.bytes_stream().boxed(),
                                logger: call.logger,
                            };
                        }
                        Err(e) => return Some((Err(e), state)),
                    }
                }
                Phase::Body { mut body, logger } => {
                    let next = body.next().await;
                    match next {
                        Some(Ok(bytes)) => {
                            let fragments = state.decoder.feed(&bytes);
                            state.ready.extend(fragments);
                            if state.decoder.is_done() {
                                state.failure = state.decoder.take_failure();
                                state.log_meta(&logger);
                            } else {
                                state.phase = Phase::Body { body, logger };
                            }
                        }
                        Some(Err(e)) => {
                            state.log_meta(&logger);
                            let err = if e.is_timeout() {
                                QuillError::source_failed("Timed out", e)
                            } else {
                                QuillError::source_failed("Stream error", e)
                            };
                            return Some((Err(err), state));
                        }
                        None => {
                            if !state.decoder.is_done() {
                                log::warn!("stream closed without [DONE] marker");
                            }
                            let tail = state.decoder.finish();
                            state.log_meta(&logger);
                            match tail {
                                Ok(fragment) => state.ready.extend(fragment),
                                Err(e) => return Some((Err(e), state)),
                            }
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{DebugKey, REQUEST_LOG_FILE, RESPONSE_META_LOG_FILE};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const SSE_OK: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "id": "c1",
                "model": "m",
                "choices": [{"delta": {"content": content}}],
            })
        )
    }

    /// Read one request (head and body) from `socket`.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer one connection with `response`, returning the request text.
    fn serve_once(listener: TcpListener, response: String) -> JoinHandle<String> {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        })
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        (listener, url)
    }

    fn call(url: String, logger: DebugLogger) -> StreamingCall {
        StreamingCall {
            client: Client::builder().no_proxy().build().unwrap(),
            url,
            api_key: "test-key".to_string(),
            body: serde_json::json!({"model": "m", "messages": [], "stream": true}),
            provider: "ollama",
            logger,
        }
    }

    async fn collect(mut stream: FragmentStream) -> Vec<Result<Fragment>> {
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_streams_fragments_until_done() {
        let (listener, url) = bind().await;
        let body = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        let server = serve_once(listener, format!("{}{}", SSE_OK, body));

        let items = collect(streaming_fragments(call(url, DebugLogger::disabled()))).await;
        let fragments: Vec<Fragment> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn test_error_status_fails_once() {
        let (listener, url) = bind().await;
        let response = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nboom";
        let _server = serve_once(listener, response.to_string());

        let items = collect(streaming_fragments(call(url, DebugLogger::disabled()))).await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(QuillError::SourceFailed(msg)) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("boom"));
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fragments_before_in_stream_error_are_delivered() {
        let (listener, url) = bind().await;
        let error = "data: {\"error\":{\"message\":\"quota\"}}\n\n";
        let body = format!("{}{}{}", chunk("A"), chunk("B"), error);
        let _server = serve_once(listener, format!("{}{}", SSE_OK, body));

        let items = collect(streaming_fragments(call(url, DebugLogger::disabled()))).await;
        assert_eq!(items.len(), 3, "items: {:?}", items);
        assert_eq!(items[0].as_ref().unwrap(), "A");
        assert_eq!(items[1].as_ref().unwrap(), "B");
        match &items[2] {
            Err(QuillError::SourceFailed(msg)) => assert!(msg.contains("quota")),
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nothing_sent_until_polled() {
        let (listener, url) = bind().await;
        let mut stream = streaming_fragments(call(url, DebugLogger::disabled()));

        let early = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(early.is_err(), "connection opened before first poll");

        let server = serve_once(listener, format!("{}{}data: [DONE]\n\n", SSE_OK, chunk("x")));
        assert_eq!(stream.next().await.unwrap().unwrap(), "x");
        assert!(stream.next().await.is_none());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_done_marker_still_completes() {
        let (listener, url) = bind().await;
        let _server = serve_once(listener, format!("{}{}", SSE_OK, chunk("partial")));

        let items = collect(streaming_fragments(call(url, DebugLogger::disabled()))).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
    }

    #[tokio::test]
    async fn test_debug_logs_written() {
        let dir = TempDir::new().unwrap();
        let logger = DebugLogger::new(dir.path().to_path_buf(), vec![DebugKey::All]);
        let (listener, url) = bind().await;
        let usage = "data: {\"choices\":[],\"usage\":{\"total_tokens\":7}}\n\n";
        let body = format!("{}{}data: [DONE]\n\n", chunk("hi"), usage);
        let _server = serve_once(listener, format!("{}{}", SSE_OK, body));

        collect(streaming_fragments(call(url, logger))).await;

        let requests = std::fs::read_to_string(dir.path().join(REQUEST_LOG_FILE)).unwrap();
        assert!(requests.contains("\"provider\":\"ollama\""));
        assert!(!requests.contains("test-key"));
        let meta = std::fs::read_to_string(dir.path().join(RESPONSE_META_LOG_FILE)).unwrap();
        let entry: serde_json::Value = serde_json::from_str(meta.lines().next().unwrap()).unwrap();
        assert_eq!(entry["response"]["usage"]["total_tokens"], 7);
        assert_eq!(entry["response"]["id"], "c1");
    }
}
