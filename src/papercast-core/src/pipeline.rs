//! Daily episode generation.
//!
//! Wires the feed, the conversation model, speech synthesis and the artifact
//! store into one gated cycle.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::PodcastError;
use crate::feed::{FeedSource, PaperItem};
use crate::generator::{CompletionBackend, RetryPolicy, generate_conversation};
use crate::merge::{Episode, merge_clips, remove_clips};
use crate::show_notes::build_show_notes;
use crate::store::{ArtifactStore, GateState};
use crate::tts::{SpeechSynthesizer, VoiceMap, synthesize};

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Progress events emitted during a cycle.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Today's episode already exists and the run was not forced.
    Skipped { last_run: NaiveDate },
    FeedLoaded { papers: usize },
    ConversationReady { lines: usize },
    SynthesisStarted { lines: usize },
    EpisodeMerged { duration_secs: f64 },
    ArtifactsWritten { date: NaiveDate },
}

/// What a generated cycle produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: NaiveDate,
    pub papers: usize,
    pub lines: usize,
    pub episode: Episode,
    pub show_notes: PathBuf,
    pub conversation: PathBuf,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Skipped { last_run: NaiveDate },
    Generated(RunReport),
}

/// One show, one output directory, one cycle at a time.
pub struct Pipeline<F, C, S> {
    feed: F,
    completion: C,
    synthesizer: S,
    voices: VoiceMap,
    retry: RetryPolicy,
    store: ArtifactStore,
    callback: Option<PipelineCallback>,
}

impl<F, C, S> Pipeline<F, C, S>
where
    F: FeedSource,
    C: CompletionBackend,
    S: SpeechSynthesizer,
{
    pub fn new(config: &Config, feed: F, completion: C, synthesizer: S) -> Self {
        Self {
            feed,
            completion,
            synthesizer,
            voices: config.voices.voice_map(),
            retry: RetryPolicy::from(&config.model),
            store: ArtifactStore::new(&config.output.dir),
            callback: None,
        }
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the cycle for `today`.
    ///
    /// Without `force`, a cycle that already succeeded today is skipped
    /// without touching any artifact. The marker is written last, after the
    /// conversation, show notes and episode are all in place.
    pub async fn run(&self, today: NaiveDate, force: bool) -> Result<RunOutcome, PodcastError> {
        self.store.ensure_dir()?;
        let _lock = self.store.lock()?;

        if !force && self.store.gate(today)? == GateState::FreshToday {
            tracing::info!(%today, "Podcast already generated today, skipping");
            self.emit_event(PipelineEvent::Skipped { last_run: today });
            return Ok(RunOutcome::Skipped { last_run: today });
        }

        let items = self.feed.fetch().await?;
        self.emit_event(PipelineEvent::FeedLoaded {
            papers: items.len(),
        });

        match self.generate(&items, today).await {
            Ok(report) => Ok(RunOutcome::Generated(report)),
            Err(e) => {
                self.store.discard_scratch();
                Err(e)
            }
        }
    }

    async fn generate(
        &self,
        items: &[PaperItem],
        today: NaiveDate,
    ) -> Result<RunReport, PodcastError> {
        let show_notes = build_show_notes(items);

        let conversation = generate_conversation(&self.completion, items, self.retry).await?;
        self.emit_event(PipelineEvent::ConversationReady {
            lines: conversation.len(),
        });

        self.emit_event(PipelineEvent::SynthesisStarted {
            lines: conversation.len(),
        });
        let clips = synthesize(
            &self.synthesizer,
            &conversation,
            &self.voices,
            &self.store.clip_dir(),
        )
        .await?;

        let staged = self.store.staged_episode_path();
        let merged = {
            let clips = clips.clone();
            let staged = staged.clone();
            tokio::task::spawn_blocking(move || merge_clips(&clips, &staged))
                .await
                .map_err(|e| PodcastError::MergeError(format!("Merge task failed: {}", e)))??
        };
        remove_clips(&clips)?;
        self.emit_event(PipelineEvent::EpisodeMerged {
            duration_secs: merged.duration_secs(),
        });

        self.store.write_conversation(&conversation)?;
        self.store.write_show_notes(&show_notes)?;
        let episode_path = self.store.commit_episode(&staged)?;
        self.store.write_marker(today)?;
        self.store.discard_scratch();

        tracing::info!(%today, lines = conversation.len(), "Podcast and show notes generated");
        self.emit_event(PipelineEvent::ArtifactsWritten { date: today });

        Ok(RunReport {
            date: today,
            papers: items.len(),
            lines: conversation.len(),
            episode: Episode {
                path: episode_path,
                ..merged
            },
            show_notes: self.store.show_notes_path(),
            conversation: self.store.conversation_path(),
        })
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
