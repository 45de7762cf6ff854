// src/provider/openai_compat.rs — Generic OpenAI-compatible provider
//
// One client serves OpenAI, Groq, Together, OpenRouter, DeepSeek, a local
// Ollama (`/v1`), and any other endpoint speaking `/chat/completions`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use std::time::Duration;

use super::{Completion, CompletionRequest, ModelProvider, TextStream, TokenUsage};
use crate::infra::errors::GoalForgeError;

pub struct OpenAICompatProvider {
    id_str: String,
    name_str: String,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            id_str: id.into(),
            name_str: name.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.prompt}));

        let mut body = serde_json::json!({
            "model": request.model_id,
            "messages": messages,
        });
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "User-Agent",
                format!("goalforge/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn transport_error(&self, e: reqwest::Error) -> GoalForgeError {
        if e.is_timeout() {
            GoalForgeError::Timeout {
                provider: self.id_str.clone(),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GoalForgeError::Provider {
                provider: self.id_str.clone(),
                message: e.to_string(),
                retriable: e.is_connect() || e.is_request(),
            }
        }
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn classify_status(
    provider: &str,
    status: u16,
    retry_after_secs: Option<u64>,
    body: String,
) -> GoalForgeError {
    match status {
        429 => GoalForgeError::RateLimited {
            provider: provider.to_string(),
            retry_after_ms: retry_after_secs.unwrap_or(0) * 1000,
        },
        500..=599 => GoalForgeError::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {status}: {body}"),
            retriable: true,
        },
        _ => GoalForgeError::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {status}: {body}"),
            retriable: false,
        },
    }
}

/// Pull the completion text and usage out of a `/chat/completions` response.
pub(crate) fn parse_completion(
    provider: &str,
    resp: &serde_json::Value,
) -> Result<Completion, GoalForgeError> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| GoalForgeError::MalformedOutput {
            provider: provider.to_string(),
            message: "response has no choices[0].message.content".into(),
        })?;

    let tokens_used = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(Completion {
        completion: content.to_string(),
        tokens_used,
    })
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    fn name(&self) -> &str {
        &self.name_str
    }

    async fn execute(&self, request: CompletionRequest) -> Result<Completion, GoalForgeError> {
        let body = self.body(&request, false);
        let response = self
            .post(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(
                &self.id_str,
                status.as_u16(),
                retry_after,
                error_body,
            ));
        }

        let resp: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| GoalForgeError::MalformedOutput {
                    provider: self.id_str.clone(),
                    message: e.to_string(),
                })?;

        parse_completion(&self.id_str, &resp)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream, GoalForgeError> {
        let body = self.body(&request, true);
        let provider_id = self.id_str.clone();

        let mut es = self
            .post(&body)
            .eventsource()
            .map_err(|e| GoalForgeError::Provider {
                provider: provider_id.clone(),
                message: format!("Failed to open SSE stream: {e}"),
                retriable: false,
            })?;

        let stream = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        if msg.data == "[DONE]" {
                            break;
                        }
                        let parsed: serde_json::Value = match serde_json::from_str(&msg.data) {
                            Ok(v) => v,
                            Err(e) => {
                                yield Err(GoalForgeError::MalformedOutput {
                                    provider: provider_id.clone(),
                                    message: format!("Failed to parse SSE data: {e}"),
                                });
                                break;
                            }
                        };
                        if let Some(delta) = parsed["choices"][0]["delta"]["content"].as_str() {
                            if !delta.is_empty() {
                                yield Ok(delta.to_string());
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(GoalForgeError::Provider {
                            provider: provider_id.clone(),
                            message: format!("SSE stream error: {e}"),
                            retriable: false,
                        });
                        break;
                    }
                }
            }
            es.close();
        };

        Ok(Box::pin(stream))
    }
}
