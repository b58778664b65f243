//! Papercast Core Library
//!
//! Turns a daily feed of research papers into a two-host podcast episode:
//! conversation generation, speech synthesis, merging, show notes and
//! artifact storage.

pub mod config;
pub mod conversation;
pub mod error;
pub mod feed;
pub mod generator;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod publish;
pub mod show_notes;
pub mod store;
pub mod tts;

pub use config::{Config, Secrets, SpeechBackend};
pub use conversation::{Conversation, DialogueLine, ReplyError, Speaker, parse_reply};
pub use error::PodcastError;
pub use feed::{FeedSource, HttpFeed, PaperItem};
pub use generator::{CompletionBackend, OpenAiCompletion, RetryPolicy, generate_conversation};
pub use merge::{Episode, merge_clips, probe_episode};
pub use pipeline::{Pipeline, PipelineCallback, PipelineEvent, RunOutcome, RunReport};
pub use prompt::build_prompt;
pub use publish::{ObjectStore, S3Store, publish, publish_all};
pub use show_notes::build_show_notes;
pub use store::{ArtifactStore, GateState, RunLock};
pub use tts::{AudioClip, KokoroSynthesizer, RemoteSpeech, SpeechSynthesizer, VoiceMap, synthesize};
