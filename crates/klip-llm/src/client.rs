//! OpenAI-compatible chat and transcription client.

use std::time::Duration;

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{LlmError, LlmResult};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Per-chunk transcription requests upload audio and wait on the model.
const TRANSCRIBE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat request options.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response
    pub json_mode: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 4096,
            json_mode: false,
        }
    }
}

/// A completed chat call with token usage.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One timed transcript span as returned by the STT provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Verbose transcription result.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscribedSegment>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// A client bound to one provider endpoint and one API key.
///
/// Platform-key clients live in the router's registry; BYOK clients are
/// built fresh per call and dropped afterwards.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> LlmResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Run a chat completion.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<ChatCompletion> {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        if options.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let usage = parsed.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(ChatCompletion {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    /// Transcribe an audio file, requesting timed segments.
    pub async fn transcribe(
        &self,
        model: &str,
        audio: Vec<u8>,
        file_name: &str,
        language: &str,
    ) -> LlmResult<Transcription> {
        let part = multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", model.to_string())
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        Ok(response.json().await?)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_parses_content_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "привет"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), "test-key").unwrap();
        let result = client
            .chat("test-model", &[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(result.content, "привет");
        assert_eq!(result.input_tokens, 12);
        assert_eq!(result.output_tokens, 3);
    }

    #[tokio::test]
    async fn json_mode_sets_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{}"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), "k").unwrap();
        let options = ChatOptions {
            json_mode: true,
            ..Default::default()
        };
        client
            .chat("m", &[ChatMessage::user("x")], &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn auth_errors_are_distinguishable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), "bad").unwrap();
        let err = client
            .chat("m", &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_auth_rejection());
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [],
                "usage": {"prompt_tokens": 1, "completion_tokens": 0}
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), "k").unwrap();
        let err = client
            .chat("m", &[ChatMessage::user("x")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn transcription_parses_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "всем привет",
                "segments": [
                    {"start": 0.0, "end": 1.5, "text": "всем"},
                    {"start": 1.5, "end": 2.8, "text": "привет"}
                ]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), "k").unwrap();
        let result = client
            .transcribe("whisper-1", vec![0u8; 16], "chunk.mp3", "ru")
            .await
            .unwrap();
        assert_eq!(result.text, "всем привет");
        assert_eq!(result.segments.len(), 2);
        assert!((result.segments[1].start - 1.5).abs() < f64::EPSILON);
    }
}
