//! Upstream chat service adapter.
//!
//! Builds the payload the upstream expects, sends it with a browser-like
//! header set, and reduces the reply to a `(content, reasoning, usage)` triple.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use serde_json::Value;

use super::types::{null_as_default, ChatCompletionRequest, Message};
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};

/// Headers sent on every upstream call so the request looks like it came
/// from the nanobananaprompt.org web page.
///
/// `Host` is not listed: the transport derives it from the upstream URL,
/// which for the default URL is `assets.chooat.com`.
pub const DISGUISE_HEADERS: [(&str, &str); 13] = [
    ("Origin", "https://nanobananaprompt.org"),
    ("Referer", "https://nanobananaprompt.org/"),
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36",
    ),
    ("Content-Type", "application/json"),
    ("Accept", "*/*"),
    ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
    (
        "sec-ch-ua",
        r#""Chromium";v="142", "Google Chrome";v="142", "Not_A Brand";v="99""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", r#""Windows""#),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "cross-site"),
    ("priority", "u=1, i"),
];

/// Build the disguise header map in declaration order.
pub fn disguise_headers() -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(DISGUISE_HEADERS.len());
    for (name, value) in DISGUISE_HEADERS {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid header name '{}': {}", name, e)))?;
        headers.insert(name, HeaderValue::from_static(value));
    }
    Ok(headers)
}

/// Body posted to the upstream.
///
/// `model` is always the configured upstream model; whatever the caller
/// asked for is dropped here.
#[derive(Debug, Serialize)]
pub struct UpstreamPayload<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub domain: &'a str,
    pub cost: u32,
}

impl<'a> UpstreamPayload<'a> {
    pub fn new(request: &'a ChatCompletionRequest, config: &'a UpstreamConfig) -> Self {
        Self {
            model: &config.model,
            messages: &request.messages,
            domain: &config.domain,
            cost: 0,
        }
    }
}

/// Upstream reply, decoded tolerantly: every field may be missing or `null`.
#[derive(Debug, Default, Deserialize)]
struct UpstreamResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<UpstreamChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    message: UpstreamMessage,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Normalized upstream answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamResult {
    pub content: String,
    pub reasoning: String,
    /// Usage object exactly as reported; `None` when absent or `null`.
    pub usage: Option<Value>,
}

impl UpstreamResult {
    /// Decode an upstream JSON body. Only the first choice is read; absent
    /// or `null` `content`/`reasoning` become empty strings.
    pub fn from_slice(body: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        let response: UpstreamResponse = serde_json::from_slice(body)?;
        let (content, reasoning) = match response.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice.message.reasoning.unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        Ok(Self {
            content,
            reasoning,
            usage: response.usage,
        })
    }

    /// Content as shown to the caller, with any reasoning quoted above it.
    pub fn display_content(&self) -> String {
        format_with_reasoning(&self.content, &self.reasoning)
    }
}

/// Prepend `reasoning` to `content` as a blockquoted "Thinking Process"
/// section followed by a horizontal rule. Empty reasoning leaves `content`
/// unchanged.
pub fn format_with_reasoning(content: &str, reasoning: &str) -> String {
    if reasoning.is_empty() {
        return content.to_string();
    }
    format!(
        "> **Thinking Process:**\n> {}\n\n---\n\n{}",
        reasoning.replace('\n', "\n> "),
        content
    )
}

/// Client for the single upstream endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a client that sends the disguise headers on every request.
    ///
    /// No timeout is configured; the transport defaults apply.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http_client = Client::builder()
            .default_headers(disguise_headers()?)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Send one request upstream and normalize the reply. Never retried.
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<UpstreamResult> {
        let payload = UpstreamPayload::new(request, &self.config);

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.config.url, "Failed to reach upstream");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| {
                tracing::error!(
                    status = %status,
                    error = %e,
                    "Failed to read upstream error body"
                );
                e
            })?;
            tracing::error!(status = %status, body = %body, "Upstream returned error");
            return Err(Error::Upstream { status, body });
        }

        let body = response.bytes().await?;
        let result = UpstreamResult::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse upstream response");
            e
        })?;

        tracing::debug!(
            content_len = result.content.len(),
            reasoning_len = result.reasoning.len(),
            has_usage = result.usage.is_some(),
            "Upstream response decoded"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_for(model: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: Some(model.to_string()),
            messages: vec![Message(serde_json::json!({"role": "user", "content": "hello"}))],
            stream: None,
        }
    }

    #[test]
    fn test_payload_overrides_model() {
        let config = UpstreamConfig::default();
        let request = request_for("gpt-4o-mini");
        let payload = serde_json::to_value(UpstreamPayload::new(&request, &config)).unwrap();

        assert_eq!(payload["model"], "openai/gpt-oss-20b:free");
        assert_eq!(payload["domain"], "nanobananaprompt.org");
        assert_eq!(payload["cost"], 0);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_payload_with_no_messages() {
        let config = UpstreamConfig::default();
        let request: ChatCompletionRequest = serde_json::from_str("{}").unwrap();
        let payload = serde_json::to_value(UpstreamPayload::new(&request, &config)).unwrap();
        assert_eq!(payload["messages"], serde_json::json!([]));
    }

    #[test]
    fn test_reasoning_formatting() {
        assert_eq!(
            format_with_reasoning("answer", "step1\nstep2"),
            "> **Thinking Process:**\n> step1\n> step2\n\n---\n\nanswer"
        );
    }

    #[test]
    fn test_empty_reasoning_leaves_content() {
        assert_eq!(format_with_reasoning("answer", ""), "answer");
    }

    #[test]
    fn test_decode_content_and_reasoning() {
        let body = br#"{"choices":[{"message":{"content":"answer","reasoning":"step1\nstep2"}}],
            "usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#;
        let result = UpstreamResult::from_slice(body).unwrap();
        assert_eq!(result.content, "answer");
        assert_eq!(result.reasoning, "step1\nstep2");
        assert_eq!(result.usage.as_ref().unwrap()["total_tokens"], 3);
        assert_eq!(
            result.display_content(),
            "> **Thinking Process:**\n> step1\n> step2\n\n---\n\nanswer"
        );
    }

    #[test]
    fn test_decode_missing_fields_default_empty() {
        let result = UpstreamResult::from_slice(br#"{"choices":[{"message":{}}]}"#).unwrap();
        assert_eq!(result, UpstreamResult::default());

        let result = UpstreamResult::from_slice(br#"{"choices":[{"message":{"content":null}}]}"#)
            .unwrap();
        assert_eq!(result.content, "");

        let result = UpstreamResult::from_slice(b"{}").unwrap();
        assert_eq!(result.content, "");
        assert!(result.usage.is_none());
    }

    #[test]
    fn test_decode_explicit_nulls_tolerated() {
        let result = UpstreamResult::from_slice(br#"{"choices":null,"usage":null}"#).unwrap();
        assert_eq!(result, UpstreamResult::default());

        let result = UpstreamResult::from_slice(br#"{"choices":[{"message":null}]}"#).unwrap();
        assert_eq!(result.content, "");
    }

    #[test]
    fn test_decode_usage_passed_through_as_is() {
        let body = br#"{"choices":[{"message":{"content":"ok"}}],
            "usage":{"prompt_tokens":null,"completion_tokens":2,"total_tokens":2,"cost":0.1}}"#;
        let result = UpstreamResult::from_slice(body).unwrap();
        assert_eq!(result.content, "ok");
        assert_eq!(
            result.usage,
            Some(serde_json::json!({
                "prompt_tokens": null,
                "completion_tokens": 2,
                "total_tokens": 2,
                "cost": 0.1
            }))
        );
    }

    #[test]
    fn test_payload_forwards_messages_verbatim() {
        let config = UpstreamConfig::default();
        let request: ChatCompletionRequest = serde_json::from_str(
            r#"{"messages":[{"role":"tool","content":"42","tool_call_id":"call_1"}]}"#,
        )
        .unwrap();
        let payload = serde_json::to_value(UpstreamPayload::new(&request, &config)).unwrap();
        assert_eq!(payload["messages"][0]["tool_call_id"], "call_1");
        assert_eq!(
            payload["messages"],
            serde_json::json!([{"role":"tool","content":"42","tool_call_id":"call_1"}])
        );
    }

    #[test]
    fn test_decode_only_first_choice() {
        let body =
            br#"{"choices":[{"message":{"content":"first"}},{"message":{"content":"second"}}]}"#;
        let result = UpstreamResult::from_slice(body).unwrap();
        assert_eq!(result.content, "first");
    }

    #[test]
    fn test_decode_invalid_json_fails() {
        assert!(UpstreamResult::from_slice(b"<html>blocked</html>").is_err());
    }

    #[test]
    fn test_disguise_headers_built() {
        let headers = disguise_headers().unwrap();
        assert_eq!(headers.len(), DISGUISE_HEADERS.len());
        assert_eq!(headers["origin"], "https://nanobananaprompt.org");
        assert_eq!(headers["referer"], "https://nanobananaprompt.org/");
        assert_eq!(headers["sec-ch-ua-platform"], "\"Windows\"");
        assert_eq!(headers["priority"], "u=1, i");
        let names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
        assert_eq!(names[0], "origin");
        assert_eq!(names[names.len() - 1], "priority");
    }
}
