//! Configuration loading, validation, and management for Confab.
//!
//! Loads configuration from `confab.toml` (or an explicit path) with
//! environment variable overrides for secrets. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use confab_core::tool::ToolKind;

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat endpoint API key (env: `CONFAB_API_KEY` / `MISTRAL_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// The agent's system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// IANA timezone used by the calendar tools
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Where inbound/outbound attachments live
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Transcript bounding configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Tool collaborator configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    "https://api.mistral.ai".into()
}
fn default_model() -> String {
    "mistral-large-latest".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_system_prompt() -> String {
    "You are a helpful, witty conversational assistant. Output a single JSON \
     object per turn following the reply schema you were given."
        .into()
}
fn default_timezone() -> String {
    "Europe/Paris".into()
}
fn default_download_path() -> PathBuf {
    PathBuf::from("download")
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timezone", &self.timezone)
            .field("download_path", &self.download_path)
            .field("context", &self.context)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Transcript bounding: when to summarize and how much to keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Summarization fires once the transcript grows past this many turns.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// How many of the oldest turns are collapsed into the digest when
    /// summarization fires.
    #[serde(default = "default_digest_oldest")]
    pub digest_oldest: usize,

    /// Where the transcript JSON mirror is written.
    #[serde(default = "default_transcript_path")]
    pub transcript_path: PathBuf,

    /// Where learned facts are appended.
    #[serde(default = "default_facts_path")]
    pub facts_path: PathBuf,
}

fn default_summarize_threshold() -> usize {
    15
}
fn default_digest_oldest() -> usize {
    10
}
fn default_transcript_path() -> PathBuf {
    PathBuf::from("local_data/context.json")
}
fn default_facts_path() -> PathBuf {
    PathBuf::from("local_data/facts.jsonl")
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            summarize_threshold: default_summarize_threshold(),
            digest_oldest: default_digest_oldest(),
            transcript_path: default_transcript_path(),
            facts_path: default_facts_path(),
        }
    }
}

/// Configuration for the tool collaborators.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools limited to one invocation per agent lifetime.
    #[serde(default = "default_single_use")]
    pub single_use: Vec<ToolKind>,

    /// Interpreter used by the script-execution tool.
    #[serde(default = "default_interpreter")]
    pub script_interpreter: String,

    /// Script execution wall-clock limit.
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,

    /// Script output is truncated beyond this many characters.
    #[serde(default = "default_script_max_output")]
    pub script_max_output: usize,

    /// Work-day window for free-slot search (24h hours).
    #[serde(default = "default_work_start")]
    pub work_start: u32,
    #[serde(default = "default_work_end")]
    pub work_end: u32,

    /// Where the calendar event store lives.
    #[serde(default = "default_calendar_path")]
    pub calendar_path: PathBuf,

    /// Giphy API key for gif browsing (env: `GIPHY_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub giphy_api_key: Option<String>,

    /// TTS endpoint API key (env: `TTS_API_KEY` / `ELEVENLABS_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_api_key: Option<String>,

    /// TTS voice identifier.
    #[serde(default = "default_voice_id")]
    pub tts_voice_id: String,
}

fn default_single_use() -> Vec<ToolKind> {
    vec![ToolKind::VoiceMessageGeneration]
}
fn default_interpreter() -> String {
    "python3".into()
}
fn default_script_timeout() -> u64 {
    30
}
fn default_script_max_output() -> usize {
    5000
}
fn default_work_start() -> u32 {
    9
}
fn default_work_end() -> u32 {
    17
}
fn default_calendar_path() -> PathBuf {
    PathBuf::from("local_data/calendar.json")
}
fn default_voice_id() -> String {
    "EXAVITQu4vr4xnSDxMaL".into()
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("single_use", &self.single_use)
            .field("script_interpreter", &self.script_interpreter)
            .field("script_timeout_secs", &self.script_timeout_secs)
            .field("script_max_output", &self.script_max_output)
            .field("work_start", &self.work_start)
            .field("work_end", &self.work_end)
            .field("calendar_path", &self.calendar_path)
            .field("giphy_api_key", &redact(&self.giphy_api_key))
            .field("tts_api_key", &redact(&self.tts_api_key))
            .field("tts_voice_id", &self.tts_voice_id)
            .finish()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            single_use: default_single_use(),
            script_interpreter: default_interpreter(),
            script_timeout_secs: default_script_timeout(),
            script_max_output: default_script_max_output(),
            work_start: default_work_start(),
            work_end: default_work_end(),
            calendar_path: default_calendar_path(),
            giphy_api_key: None,
            tts_api_key: None,
            tts_voice_id: default_voice_id(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `confab.toml` in the working directory.
    ///
    /// Secrets are overridden from the environment:
    /// - `CONFAB_API_KEY` / `MISTRAL_API_KEY` — chat endpoint
    /// - `GIPHY_API_KEY` — gif search
    /// - `TTS_API_KEY` / `ELEVENLABS_API_KEY` — voice synthesis
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("confab.toml"))?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("CONFAB_API_KEY")
                .ok()
                .or_else(|| std::env::var("MISTRAL_API_KEY").ok());
        }
        if config.tools.giphy_api_key.is_none() {
            config.tools.giphy_api_key = std::env::var("GIPHY_API_KEY").ok();
        }
        if config.tools.tts_api_key.is_none() {
            config.tools.tts_api_key = std::env::var("TTS_API_KEY")
                .ok()
                .or_else(|| std::env::var("ELEVENLABS_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("CONFAB_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.digest_oldest == 0 {
            return Err(ConfigError::ValidationError(
                "context.digest_oldest must be at least 1".into(),
            ));
        }

        if self.context.digest_oldest >= self.context.summarize_threshold {
            return Err(ConfigError::ValidationError(
                "context.digest_oldest must be smaller than context.summarize_threshold".into(),
            ));
        }

        if self.tools.work_start >= self.tools.work_end || self.tools.work_end > 24 {
            return Err(ConfigError::ValidationError(
                "tools.work_start/work_end must describe a window within the day".into(),
            ));
        }

        Ok(())
    }

    /// Check if a chat API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            timezone: default_timezone(),
            download_path: default_download_path(),
            context: ContextConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model, "mistral-large-latest");
        assert_eq!(config.context.summarize_threshold, 15);
        assert_eq!(config.context.digest_oldest, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.tools.single_use, config.tools.single_use);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig { temperature: 5.0, ..AppConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn digest_oldest_must_undershoot_threshold() {
        let mut config = AppConfig::default();
        config.context.digest_oldest = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/confab.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().timezone, "Europe/Paris");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "model = \"mistral-small-latest\"\n[context]\nsummarize_threshold = 20").unwrap();
        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.model, "mistral-small-latest");
        assert_eq!(config.context.summarize_threshold, 20);
        assert_eq!(config.context.digest_oldest, 10);
    }

    #[test]
    fn single_use_parses_wire_tags() {
        let config: AppConfig = toml::from_str(
            "[tools]\nsingle_use = [\"voiceMessageGeneration\", \"attachments\"]",
        )
        .unwrap();
        assert_eq!(
            config.tools.single_use,
            vec![ToolKind::VoiceMessageGeneration, ToolKind::Attachments]
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
