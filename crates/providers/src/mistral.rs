//! Mistral chat client — OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! Streams server-sent events and forwards the raw text deltas as
//! [`StreamChunk`]s. The deltas are UTF-8 fragments of a single JSON object
//! (the endpoint runs in JSON-object response mode); chunk boundaries carry
//! no alignment guarantee — reassembly is the stream extractor's job.

use base64::Engine;
use confab_config::AppConfig;
use confab_core::error::ProviderError;
use confab_core::provider::{ChatMessage, ChatModel, ChatRequest, StreamChunk};
use confab_core::turn::Role;
use futures::StreamExt;
use tracing::{debug, trace};

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for a Mistral-style chat completions endpoint.
pub struct MistralClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MistralClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build a client from the application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("missing chat API key".into()))?;
        Ok(Self::new(config.base_url.clone(), api_key))
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            // The endpoint has no separate tool role for free-text results;
            // feed them back as user-visible context.
            Role::Tool => "user",
        }
    }

    /// Convert one outbound message to the wire shape, inlining images as
    /// base64 data URLs. Unreadable image files are skipped.
    fn to_api_message(message: &ChatMessage) -> serde_json::Value {
        if message.images.is_empty() {
            return serde_json::json!({
                "role": Self::role_str(message.role),
                "content": message.content,
            });
        }

        let mut parts = vec![serde_json::json!({"type": "text", "text": message.content})];
        for path in &message.images {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    let mime = mime_for_path(path);
                    parts.push(serde_json::json!({
                        "type": "image_url",
                        "image_url": format!("data:{mime};base64,{encoded}"),
                    }));
                }
                Err(e) => {
                    trace!(path = %path, error = %e, "Skipping unreadable image attachment");
                }
            }
        }

        serde_json::json!({
            "role": Self::role_str(message.role),
            "content": parts,
        })
    }

    fn build_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        // The tool constraint rides on the system message, so the model's
        // freedom mirrors what the server can still satisfy.
        let mut outbound = request.messages.clone();
        let has_system = matches!(outbound.first(), Some(m) if m.role == Role::System);
        if has_system {
            let first = &mut outbound[0];
            first.content = format!("{}\n\n{}", first.content, request.tool_schema.describe());
        } else {
            outbound.insert(
                0,
                ChatMessage {
                    role: Role::System,
                    content: request.tool_schema.describe(),
                    images: vec![],
                },
            );
        }

        let messages: Vec<serde_json::Value> =
            outbound.iter().map(Self::to_api_message).collect();

        serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "stream": stream,
            "response_format": {"type": "json_object"},
        })
    }

    fn status_error(status: u16, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited { retry_after_secs: 5 },
            401 | 403 => ProviderError::AuthenticationFailed("Invalid API key".into()),
            _ => ProviderError::ApiError { status_code: status, message: body },
        }
    }
}

/// Extract the payload of one SSE line, if it is a data line.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Pull the text delta out of one streamed completion event.
fn delta_text(event: &serde_json::Value) -> Option<String> {
    event["choices"][0]["delta"]["content"].as_str().map(str::to_string)
}

fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[async_trait::async_trait]
impl ChatModel for MistralClient {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_body(&request, false);

        debug!(model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "response carried no message content".into(),
            })
    }

    async fn stream(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_body(&request, true);

        debug!(model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    let Some(data) = sse_data(&line) else { continue };
                    if data.is_empty() {
                        continue;
                    }

                    if data == "[DONE]" {
                        let _ = tx.send(Ok(StreamChunk::done())).await;
                        return;
                    }

                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            trace!(error = %e, data = %data, "Ignoring unparseable SSE line");
                            continue;
                        }
                    };

                    if let Some(text) = delta_text(&event) {
                        if tx.send(Ok(StreamChunk::text(text))).await.is_err() {
                            // Receiver dropped — the turn was cancelled.
                            return;
                        }
                    }
                }
            }

            // Stream ended without [DONE] — still mark completion.
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}
