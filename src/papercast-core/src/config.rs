//! Configuration module for loading TOML config files.

use chrono::{Local, NaiveDate, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conversation::Speaker;
use crate::error::PodcastError;
use crate::tts::VoiceMap;

/// Takara AI daily papers feed.
pub const DEFAULT_FEED_URL: &str = "http://papers.takara.ai/api/feed";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub model: ModelConfig,
    pub voices: VoicesConfig,
    pub speech: SpeechConfig,
    pub output: OutputConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
        }
    }
}

/// Language model settings for conversation generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Total completion calls before giving up.
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl ModelConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string(),
            api_base: "https://api.deepinfra.com/v1/openai".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            max_attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub host_a: String,
    pub host_b: String,
}

impl VoicesConfig {
    pub fn voice_map(&self) -> VoiceMap {
        VoiceMap::new()
            .with_voice(Speaker::HostA, &self.host_a)
            .with_voice(Speaker::HostB, &self.host_b)
    }
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            host_a: "bm_george".to_string(),
            host_b: "af_sky".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// On-device kokoro-tiny engine.
    Local,
    /// OpenAI-compatible `/audio/speech` endpoint.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
    /// Model name sent to the remote backend.
    pub model: String,
    pub api_base: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackend::Local,
            model: "tts-1".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Which calendar decides whether the podcast already ran "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calendar {
    Local,
    Utc,
}

impl Calendar {
    pub fn today(&self) -> NaiveDate {
        match self {
            Calendar::Local => Local::now().date_naive(),
            Calendar::Utc => Utc::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub calendar: Calendar,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            calendar: Calendar::Local,
        }
    }
}

/// S3-compatible object storage target.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: None,
            endpoint: None,
            region: "auto".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, PodcastError> {
        toml::from_str(content)
            .map_err(|e| PodcastError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Apply endpoint overrides from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup("OPENAI_API_BASE").or_else(|| lookup("OPENAI_BASE_URL")) {
            self.model.api_base = base;
        }
        if let Some(bucket) = lookup("R2_BUCKET_NAME") {
            self.publish.bucket = Some(bucket);
        }
        if let Some(endpoint) = lookup("R2_ENDPOINT_URL") {
            self.publish.endpoint = Some(endpoint);
        }
    }
}

/// Credentials, always sourced from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub speech_api_key: Option<String>,
    pub storage_access_key: Option<String>,
    pub storage_secret_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("api_key", &mask(&self.api_key))
            .field("speech_api_key", &mask(&self.speech_api_key))
            .field("storage_access_key", &mask(&self.storage_access_key))
            .field("storage_secret_key", &mask(&self.storage_secret_key))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("DEEPINFRA_API").or_else(|| lookup("OPENAI_API_KEY"));
        Self {
            speech_api_key: lookup("SPEECH_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            api_key,
            storage_access_key: lookup("R2_ACCESS_KEY"),
            storage_secret_key: lookup("R2_SECRET_KEY"),
        }
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.feed.url, DEFAULT_FEED_URL);
        assert_eq!(config.model.max_attempts, 3);
        assert_eq!(config.model.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.model.max_tokens, 4096);
        assert_eq!(config.speech.backend, SpeechBackend::Local);
        assert_eq!(config.output.calendar, Calendar::Local);
        assert!(!config.publish.enabled);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_str(
            r#"
            [model]
            max_attempts = 5
            retry_delay_secs = 0

            [speech]
            backend = "remote"

            [output]
            dir = "/tmp/papercast"
            calendar = "utc"
            "#,
        )
        .unwrap();

        assert_eq!(config.model.max_attempts, 5);
        assert_eq!(config.model.retry_delay(), Duration::ZERO);
        assert_eq!(config.model.name, ModelConfig::default().name);
        assert_eq!(config.speech.backend, SpeechBackend::Remote);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/papercast"));
        assert_eq!(config.output.calendar, Calendar::Utc);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_str("[model\nname = 1").unwrap_err();
        assert!(matches!(err, PodcastError::ConfigError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
            ("R2_BUCKET_NAME", "podcasts"),
            ("R2_ENDPOINT_URL", "https://r2.example.com"),
        ]);
        let mut config = default_config();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.model.api_base, "http://localhost:8080/v1");
        assert_eq!(config.publish.bucket.as_deref(), Some("podcasts"));
        assert_eq!(config.publish.endpoint.as_deref(), Some("https://r2.example.com"));
    }

    #[test]
    fn test_secrets_prefer_deepinfra_key() {
        let env: HashMap<&str, &str> =
            HashMap::from([("DEEPINFRA_API", "deep"), ("OPENAI_API_KEY", "open")]);
        let secrets = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(secrets.api_key.as_deref(), Some("deep"));
        assert_eq!(secrets.speech_api_key.as_deref(), Some("open"));
        assert!(secrets.storage_access_key.is_none());
        assert!(!format!("{:?}", secrets).contains("deep"));
    }

    #[test]
    fn test_voice_map_from_config() {
        let voices = VoicesConfig::default().voice_map();
        assert_eq!(voices.voice_for(Speaker::HostA).unwrap(), "bm_george");
        assert_eq!(voices.voice_for(Speaker::HostB).unwrap(), "af_sky");
    }
}
