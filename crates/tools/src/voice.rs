//! Voice tool — synthesizes a spoken clip via a TTS HTTP endpoint.
//!
//! Writes the returned audio to the download directory and hands the path
//! back as an attachment for the pending reply. Limited to one use per agent
//! lifetime by the schema gate, not by this handler.

use std::path::PathBuf;

use async_trait::async_trait;
use confab_core::error::ToolError;
use confab_core::reply::ToolCall;
use confab_core::tool::{ToolHandler, ToolKind, ToolOutput};
use tracing::debug;
use uuid::Uuid;

const TTS_BASE_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

pub struct VoiceTool {
    client: reqwest::Client,
    api_key: Option<String>,
    voice_id: String,
    output_dir: PathBuf,
}

impl VoiceTool {
    pub fn new(api_key: Option<String>, voice_id: String, output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key,
            voice_id,
            output_dir,
        }
    }
}

#[async_trait]
impl ToolHandler for VoiceTool {
    fn kind(&self) -> ToolKind {
        ToolKind::VoiceMessageGeneration
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let ToolCall::VoiceMessageGeneration { message } = call else {
            return Err(ToolError::InvalidArguments(format!(
                "expected voiceMessageGeneration, got {}",
                call.kind()
            )));
        };

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::NotAvailable("voice generation requires a TTS API key".into())
        })?;

        let url = format!("{TTS_BASE_URL}/{}", self.voice_id);
        debug!(voice = %self.voice_id, chars = message.len(), "Generating voice clip");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .query(&[("output_format", "mp3_44100_128")])
            .json(&serde_json::json!({"text": message}))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "voiceMessageGeneration".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "voiceMessageGeneration".into(),
                reason: format!("TTS endpoint returned HTTP {}", response.status()),
            });
        }

        let audio = response.bytes().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "voiceMessageGeneration".into(),
            reason: e.to_string(),
        })?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "voiceMessageGeneration".into(),
            reason: format!("failed to create output directory: {e}"),
        })?;

        let path = self.output_dir.join(format!("voice-{}.mp3", Uuid::new_v4()));
        std::fs::write(&path, &audio).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "voiceMessageGeneration".into(),
            reason: format!("failed to write audio file: {e}"),
        })?;

        Ok(ToolOutput {
            text: "Voice message generated.".into(),
            attachments: vec![path.to_string_lossy().into_owned()],
        })
    }
}
