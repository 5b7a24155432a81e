//! Debug logging of generation requests and responses.
//!
//! When enabled, requests and response metadata are appended to JSONL files
//! under the quill home's `logs/` directory. Logging never fails a request:
//! write errors are dropped after a `log::warn!`.

use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

pub const REQUEST_LOG_FILE: &str = "requests.jsonl";
pub const RESPONSE_META_LOG_FILE: &str = "response_meta.jsonl";

/// Debug feature keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugKey {
    /// Log all API requests to requests.jsonl
    RequestLog,
    /// Log response metadata (usage stats, model info) to response_meta.jsonl
    ResponseMeta,
    /// Enable all debug features
    All,
}

impl DebugKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "request-log" | "request_log" => Some(DebugKey::RequestLog),
            "response-meta" | "response_meta" => Some(DebugKey::ResponseMeta),
            "all" => Some(DebugKey::All),
            _ => None,
        }
    }

    /// Parse a comma-separated list of debug keys (e.g. "request-log,response-meta").
    /// Invalid segments are silently ignored.
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .filter_map(|segment| Self::parse(segment.trim()))
            .collect()
    }
}

/// JSONL writer shared by every call made during one invocation.
#[derive(Debug, Clone, Default)]
pub struct DebugLogger {
    log_dir: Option<PathBuf>,
    keys: Vec<DebugKey>,
}

impl DebugLogger {
    pub fn new(log_dir: PathBuf, keys: Vec<DebugKey>) -> Self {
        Self {
            log_dir: Some(log_dir),
            keys,
        }
    }

    /// A logger that never writes.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, required_key: DebugKey) -> bool {
        self.log_dir.is_some()
            && self
                .keys
                .iter()
                .any(|k| matches!(k, DebugKey::All) || *k == required_key)
    }

    /// Log an API request to requests.jsonl if enabled.
    ///
    /// The body never contains credentials; the bearer key travels in a header.
    pub fn log_request(
        &self,
        request_id: Uuid,
        provider: &str,
        url: &str,
        request_body: &serde_json::Value,
    ) {
        self.log_to_jsonl(
            DebugKey::RequestLog,
            REQUEST_LOG_FILE,
            request_id,
            json!({
                "provider": provider,
                "url": url,
                "request": request_body,
            }),
        );
    }

    /// Log response metadata to response_meta.jsonl if enabled
    pub fn log_response_meta(&self, request_id: Uuid, response_meta: &serde_json::Value) {
        self.log_to_jsonl(
            DebugKey::ResponseMeta,
            RESPONSE_META_LOG_FILE,
            request_id,
            json!({ "response": response_meta }),
        );
    }

    fn log_to_jsonl(
        &self,
        required_key: DebugKey,
        filename: &str,
        request_id: Uuid,
        mut entry: serde_json::Value,
    ) {
        if !self.is_enabled(required_key) {
            return;
        }
        let Some(dir) = &self.log_dir else {
            return;
        };

        entry["timestamp"] = json!(chrono::Utc::now().to_rfc3339());
        entry["request_id"] = json!(request_id.to_string());

        let written = fs::create_dir_all(dir).and_then(|_| {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(filename))?;
            writeln!(file, "{}", entry)
        });
        if let Err(e) = written {
            log::warn!("failed to write {}: {}", filename, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_lines(path: PathBuf) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(DebugKey::parse("request-log"), Some(DebugKey::RequestLog));
        assert_eq!(DebugKey::parse("response_meta"), Some(DebugKey::ResponseMeta));
        assert_eq!(DebugKey::parse("all"), Some(DebugKey::All));
        assert_eq!(DebugKey::parse("verbose"), None);
    }

    #[test]
    fn test_parse_list_ignores_invalid() {
        assert_eq!(
            DebugKey::parse_list("request-log, bogus ,response-meta"),
            vec![DebugKey::RequestLog, DebugKey::ResponseMeta]
        );
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = DebugLogger::disabled();
        assert!(!logger.is_enabled(DebugKey::RequestLog));
        logger.log_request(Uuid::new_v4(), "ollama", "http://x", &json!({}));
    }

    #[test]
    fn test_request_log_written() {
        let dir = TempDir::new().unwrap();
        let logger = DebugLogger::new(dir.path().to_path_buf(), vec![DebugKey::RequestLog]);
        let id = Uuid::new_v4();
        logger.log_request(id, "gemini", "https://example/chat", &json!({"model": "m"}));
        logger.log_response_meta(id, &json!({"model": "m"}));

        let lines = read_lines(dir.path().join(REQUEST_LOG_FILE));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["provider"], "gemini");
        assert_eq!(lines[0]["request"]["model"], "m");
        assert_eq!(lines[0]["request_id"], id.to_string());
        assert!(lines[0]["timestamp"].is_string());
        // response_meta was not enabled
        assert!(!dir.path().join(RESPONSE_META_LOG_FILE).exists());
    }

    #[test]
    fn test_all_enables_everything() {
        let dir = TempDir::new().unwrap();
        let logger = DebugLogger::new(dir.path().join("logs"), vec![DebugKey::All]);
        let id = Uuid::new_v4();
        logger.log_response_meta(id, &json!({"usage": {"total_tokens": 3}}));
        let lines = read_lines(dir.path().join("logs").join(RESPONSE_META_LOG_FILE));
        assert_eq!(lines[0]["response"]["usage"]["total_tokens"], 3);
    }
}
