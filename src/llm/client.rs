use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::sse::{data_payload, LineBuffer};
use super::{ChatModel, LlmError, LlmResponse, TextStream};

/// OpenAI-compatible chat completions client (OpenRouter, OpenAI, Gemini's
/// compatibility endpoint, local servers).
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    cost: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

/// Mid-stream failure reported by OpenRouter and OpenAI inside a `data:` line.
#[derive(Debug, Clone, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum StreamLine {
    Delta(String),
    Done,
    Failed(String),
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = data_payload(line) else {
        return StreamLine::Skip;
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next();
            if let Some(error) = chunk.error {
                let message = if error.message.is_empty() {
                    "provider reported an error".to_string()
                } else {
                    error.message
                };
                return StreamLine::Failed(message);
            }
            let Some(choice) = choice else {
                return StreamLine::Skip;
            };
            if choice.finish_reason.as_deref() == Some("error") {
                return StreamLine::Failed("provider reported an error".to_string());
            }
            choice
                .delta
                .content
                .filter(|text| !text.is_empty())
                .map(StreamLine::Delta)
                .unwrap_or(StreamLine::Skip)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream line");
            StreamLine::Skip
        }
    }
}

impl LlmClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn send(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_message.to_string(),
        });

        let request = ChatCompletionRequest {
            model: model.to_string(),
            max_tokens: 4096,
            messages,
            stream,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.send(model, system_prompt, user_message, false).await?;

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = api_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("")
            .to_string();
        let usage = api_response.usage;

        Ok(LlmResponse {
            text,
            input_tokens: usage.as_ref().map_or(0, |u| u.prompt_tokens),
            output_tokens: usage.as_ref().map_or(0, |u| u.completion_tokens),
            cost: usage.and_then(|u| u.cost).unwrap_or(0.0),
        })
    }

    async fn stream(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<TextStream, LlmError> {
        let response = self.send(model, system_prompt, user_message, true).await?;
        let mut body = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            let mut finished = false;

            while !finished {
                let Some(bytes) = body.next().await else {
                    break;
                };
                let bytes = match bytes {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(LlmError::Stream(e.to_string()));
                        break;
                    }
                };
                for line in lines.push(&bytes) {
                    match parse_stream_line(&line) {
                        StreamLine::Delta(text) => yield Ok(text),
                        StreamLine::Done => {
                            finished = true;
                            break;
                        }
                        StreamLine::Failed(message) => {
                            yield Err(LlmError::Stream(message));
                            finished = true;
                            break;
                        }
                        StreamLine::Skip => {}
                    }
                }
            }

            if !finished {
                if let Some(line) = lines.finish() {
                    match parse_stream_line(&line) {
                        StreamLine::Delta(text) => yield Ok(text),
                        StreamLine::Failed(message) => yield Err(LlmError::Stream(message)),
                        StreamLine::Done | StreamLine::Skip => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
