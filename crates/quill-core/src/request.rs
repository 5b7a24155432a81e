//! Generation request types.
//!
//! These mirror the chat-completions wire format directly: role-tagged
//! messages, a model identifier, and the streaming flag.

use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, EnumString};

/// Message role, as understood by chat-completions APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One generation call. Created per invocation and consumed by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    /// Sampling temperature, omitted from the body when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Ask the provider for a trailing usage chunk on streaming calls.
    #[serde(skip)]
    pub include_usage: bool,
}

impl GenerationRequest {
    /// A streaming request for `model` over `messages`.
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: None,
            include_usage: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_usage(mut self, include_usage: bool) -> Self {
        self.include_usage = include_usage;
        self
    }
}

/// Build the JSON body for a chat-completions call.
///
/// `stream_options` is only sent when usage reporting was requested, since
/// not every OpenAI-compatible server accepts it.
pub fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "stream": request.stream,
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    if request.stream && request.include_usage {
        body["stream_options"] = json!({ "include_usage": true });
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_build_request_body_minimal() {
        let request = GenerationRequest::streaming(
            "llama3.2",
            vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("hello"),
            ],
        );
        let body = build_request_body(&request);

        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("stream_options").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_build_request_body_with_temperature() {
        let request = GenerationRequest::streaming("m", vec![ChatMessage::user("x")])
            .with_temperature(0.5);
        let body = build_request_body(&request);
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_usage_requested() {
        let request =
            GenerationRequest::streaming("m", vec![ChatMessage::user("x")]).with_usage(true);
        let body = build_request_body(&request);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_non_streaming_has_no_stream_options() {
        let mut request = GenerationRequest::streaming("m", vec![ChatMessage::assistant("x")])
            .with_usage(true);
        request.stream = false;
        let body = build_request_body(&request);
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from_str("assistant").unwrap(), Role::Assistant);
        assert_eq!(Role::User.as_ref(), "user");
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"system","content":"hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::system("hi"));
    }
}
