//! TTS module: per-line speech synthesis.
//!
//! Every dialogue line becomes its own WAV clip. Clips are synthesized
//! concurrently and the batch only succeeds if every line does.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::try_join_all;
use kokoro_tiny::TtsEngine;

use crate::config::SpeechConfig;
use crate::conversation::{Conversation, Speaker};
use crate::error::PodcastError;

/// Synthesized speech for one dialogue line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Position of the line in the conversation.
    pub index: usize,
    pub path: PathBuf,
}

/// Lookup from speaker identity to voice identifier.
#[derive(Debug, Clone, Default)]
pub struct VoiceMap {
    voices: HashMap<Speaker, String>,
}

impl VoiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voice(mut self, speaker: Speaker, voice: impl Into<String>) -> Self {
        self.voices.insert(speaker, voice.into());
        self
    }

    pub fn voice_for(&self, speaker: Speaker) -> Result<&str, PodcastError> {
        self.voices
            .get(&speaker)
            .map(String::as_str)
            .ok_or_else(|| PodcastError::TtsError(format!("No voice configured for {}", speaker)))
    }

    pub fn voices(&self) -> impl Iterator<Item = &str> {
        self.voices.values().map(String::as_str)
    }
}

/// A text-to-speech provider that writes one WAV file per request.
pub trait SpeechSynthesizer {
    fn synthesize_to_file(
        &self,
        text: &str,
        voice: &str,
        path: &Path,
    ) -> impl Future<Output = Result<(), PodcastError>>;
}

/// Synthesize every line of `conversation` into `clip_dir`.
///
/// All requests are in flight at once. The returned clips are index-aligned
/// with the conversation. If any line fails, the whole batch fails and the
/// clips already written are removed.
pub async fn synthesize<S: SpeechSynthesizer>(
    synthesizer: &S,
    conversation: &Conversation,
    voices: &VoiceMap,
    clip_dir: &Path,
) -> Result<Vec<AudioClip>, PodcastError> {
    tokio::fs::create_dir_all(clip_dir).await?;

    let jobs = conversation
        .lines()
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let path = clip_dir.join(format!("line_{:03}.wav", index));
            async move {
                let synthesis_error = |reason: String| PodcastError::SynthesisError {
                    line: index,
                    reason,
                };

                let voice = voices
                    .voice_for(line.speaker)
                    .map_err(|e| synthesis_error(e.to_string()))?;
                let text = clean_for_speech(&line.text);

                tracing::debug!(index, speaker = %line.speaker, voice, "Synthesizing line");
                synthesizer
                    .synthesize_to_file(&text, voice, &path)
                    .await
                    .map_err(|e| synthesis_error(e.to_string()))?;

                Ok::<_, PodcastError>(AudioClip { index, path })
            }
        });

    match try_join_all(jobs).await {
        Ok(clips) => {
            tracing::info!(clips = clips.len(), "Synthesized all lines");
            Ok(clips)
        }
        Err(e) => {
            tracing::error!(error = %e, "Speech synthesis failed, discarding clips");
            if let Err(cleanup) = tokio::fs::remove_dir_all(clip_dir).await {
                tracing::warn!(error = %cleanup, "Failed to remove clip directory");
            }
            Err(e)
        }
    }
}

/// Strip markup the model sometimes adds so it is not read aloud.
pub fn clean_for_speech(text: &str) -> String {
    let mut result = text.to_string();

    if let Ok(tag_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = tag_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    let cleaned = result.trim();
    if cleaned.is_empty() {
        text.trim().to_string()
    } else {
        cleaned.to_string()
    }
}

/// On-device synthesis with kokoro-tiny.
pub struct KokoroSynthesizer {
    engine: Mutex<TtsEngine>,
    available_voices: Vec<String>,
}

impl KokoroSynthesizer {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new() -> Result<Self, PodcastError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PodcastError::TtsError(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine: Mutex::new(engine),
            available_voices,
        })
    }

    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PodcastError> {
        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PodcastError::TtsError(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                self.format_available_voices()
            )));
        }
        Ok(())
    }

    /// Validate every voice in the map before any synthesis starts.
    pub fn validate_voices(&self, voices: &VoiceMap) -> Result<(), PodcastError> {
        voices.voices().try_for_each(|v| self.validate_voice(v))
    }

    fn format_available_voices(&self) -> String {
        let mut english_voices: Vec<&String> = self
            .available_voices
            .iter()
            .filter(|v| {
                v.starts_with("af_")
                    || v.starts_with("am_")
                    || v.starts_with("bf_")
                    || v.starts_with("bm_")
            })
            .collect();
        english_voices.sort();

        english_voices
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl SpeechSynthesizer for KokoroSynthesizer {
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice: &str,
        path: &Path,
    ) -> Result<(), PodcastError> {
        self.validate_voice(voice)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| PodcastError::TtsError(format!("Non UTF-8 path: {}", path.display())))?;

        let mut engine = self
            .engine
            .lock()
            .map_err(|_| PodcastError::TtsError("TTS engine lock poisoned".to_string()))?;

        // Kokoro has a ~200 char safe limit per call.
        let mut samples = Vec::new();
        for chunk in split_into_chunks(text, 200) {
            let chunk_samples = engine
                .synthesize(&chunk, Some(voice))
                .map_err(|e| PodcastError::TtsError(format!("Synthesis failed: {}", e)))?;
            samples.extend(chunk_samples);

            // 0.3s pause at 24kHz between chunks to prevent cutoff
            samples.extend(vec![0.0; 7200]);
        }

        if samples.is_empty() {
            return Err(PodcastError::TtsError("Nothing to synthesize".to_string()));
        }

        engine
            .save_wav(path_str, &samples)
            .map_err(|e| PodcastError::TtsError(format!("Failed to save WAV: {}", e)))
    }
}

/// Synthesis through an OpenAI-compatible `/audio/speech` endpoint.
pub struct RemoteSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl RemoteSpeech {
    pub fn new(settings: &SpeechConfig, api_key: impl Into<String>) -> Result<Self, PodcastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
        })
    }
}

impl SpeechSynthesizer for RemoteSpeech {
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice: &str,
        path: &Path,
    ) -> Result<(), PodcastError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "response_format": "wav",
        });

        let resp = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PodcastError::TtsError(format!("Speech request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(PodcastError::TtsError(format!(
                "Speech API error: {} - {}",
                status, message
            )));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| PodcastError::TtsError(format!("Failed to read speech audio: {}", e)))?;
        if audio.is_empty() {
            return Err(PodcastError::TtsError("Speech API returned no audio".to_string()));
        }

        tokio::fs::write(path, &audio).await?;
        Ok(())
    }
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // A single long sentence is split on commas instead.
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}
