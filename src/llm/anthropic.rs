use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::sse::{data_payload, LineBuffer};
use super::{ChatModel, LlmError, LlmResponse, TextStream};

pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// The subset of Messages streaming events that carry text or end the stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, PartialEq)]
enum StreamLine {
    Delta(String),
    Stop,
    Failed(String),
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = data_payload(line) else {
        return StreamLine::Skip;
    };
    match serde_json::from_str::<StreamEvent>(data) {
        Ok(StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        }) if !text.is_empty() => StreamLine::Delta(text),
        Ok(StreamEvent::MessageStop) => StreamLine::Stop,
        Ok(StreamEvent::Error { error }) => StreamLine::Failed(error.message),
        Ok(_) => StreamLine::Skip,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Anthropic stream line");
            StreamLine::Skip
        }
    }
}

impl AnthropicClient {
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
        let request = ApiRequest {
            model: model.to_string(),
            max_tokens: 4096,
            system: system_prompt.map(|s| s.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            stream,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
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
impl ChatModel for AnthropicClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.send(model, system_prompt, user_message, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = api_response
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            text,
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
            cost: 0.0,
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
                        StreamLine::Stop => {
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
        };

        Ok(Box::pin(stream))
    }
}
