//! Error types for the podcast pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("Failed to fetch feed {url}: {reason}")]
    FetchError { url: String, reason: String },

    #[error("Failed to parse feed: {0}")]
    ParseError(String),

    #[error("Conversation generation failed after {attempts} attempts: {last_error}")]
    GenerationExhausted { attempts: u32, last_error: String },

    #[error("Speech synthesis failed for line {line}: {reason}")]
    SynthesisError { line: usize, reason: String },

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Failed to merge audio clips: {0}")]
    MergeError(String),

    #[error("Failed to upload {}: {reason}", path.display())]
    UploadError { path: PathBuf, reason: String },

    #[error("Another generation cycle is already running (lock held on {})", .0.display())]
    RunInProgress(PathBuf),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
