//! Flat-file artifact store and the once-a-day run gate.
//!
//! Everything lives in a single output directory. Writes go through a
//! temporary file in the same directory followed by a rename, and a whole
//! generation cycle holds an exclusive lock on `.papercast.lock`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fs2::FileExt;

use crate::conversation::Conversation;
use crate::error::PodcastError;

pub const CONVERSATION_FILE: &str = "conversation.json";
pub const SHOW_NOTES_FILE: &str = "show_notes.txt";
pub const EPISODE_FILE: &str = "episode.wav";
pub const MARKER_FILE: &str = "last_run.txt";
pub const LOCK_FILE: &str = ".papercast.lock";
const CLIP_DIR: &str = "clips";
const STAGED_EPISODE_FILE: &str = ".episode.wav.partial";
const MARKER_FORMAT: &str = "%Y-%m-%d";

/// Whether today's episode already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Stale,
    FreshToday,
}

/// Output directory holding the persisted artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.dir.join(CONVERSATION_FILE)
    }

    pub fn show_notes_path(&self) -> PathBuf {
        self.dir.join(SHOW_NOTES_FILE)
    }

    pub fn episode_path(&self) -> PathBuf {
        self.dir.join(EPISODE_FILE)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(MARKER_FILE)
    }

    pub fn clip_dir(&self) -> PathBuf {
        self.dir.join(CLIP_DIR)
    }

    /// Where the episode is merged before being committed.
    pub fn staged_episode_path(&self) -> PathBuf {
        self.dir.join(STAGED_EPISODE_FILE)
    }

    /// Artifacts in publish order: episode, show notes, conversation.
    pub fn artifact_paths(&self) -> [PathBuf; 3] {
        [
            self.episode_path(),
            self.show_notes_path(),
            self.conversation_path(),
        ]
    }

    pub fn ensure_dir(&self) -> Result<(), PodcastError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Take the single-writer lock for a generation cycle.
    pub fn lock(&self) -> Result<RunLock, PodcastError> {
        RunLock::acquire(&self.dir.join(LOCK_FILE))
    }

    /// Date of the last successful generation, if any.
    ///
    /// An unreadable date is treated as "never ran".
    pub fn last_run(&self) -> Result<Option<NaiveDate>, PodcastError> {
        let content = match fs::read_to_string(self.marker_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match NaiveDate::parse_from_str(content.trim(), MARKER_FORMAT) {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                tracing::warn!(error = %e, marker = content.trim(), "Ignoring malformed run marker");
                Ok(None)
            }
        }
    }

    pub fn gate(&self, today: NaiveDate) -> Result<GateState, PodcastError> {
        Ok(match self.last_run()? {
            Some(date) if date == today => GateState::FreshToday,
            _ => GateState::Stale,
        })
    }

    pub fn write_marker(&self, today: NaiveDate) -> Result<(), PodcastError> {
        write_atomic(
            &self.marker_path(),
            today.format(MARKER_FORMAT).to_string().as_bytes(),
        )?;
        Ok(())
    }

    pub fn write_conversation(&self, conversation: &Conversation) -> Result<(), PodcastError> {
        let json = conversation.to_json_pretty()?;
        write_atomic(&self.conversation_path(), json.as_bytes())?;
        Ok(())
    }

    pub fn write_show_notes(&self, notes: &str) -> Result<(), PodcastError> {
        write_atomic(&self.show_notes_path(), notes.as_bytes())?;
        Ok(())
    }

    /// Move a fully merged episode into place, replacing the previous one.
    pub fn commit_episode(&self, staged: &Path) -> Result<PathBuf, PodcastError> {
        let target = self.episode_path();
        fs::rename(staged, &target)?;
        Ok(target)
    }

    pub fn load_conversation(&self) -> Result<Option<Conversation>, PodcastError> {
        match fs::read_to_string(self.conversation_path()) {
            Ok(json) => Conversation::from_json(&json)
                .map(Some)
                .map_err(|e| PodcastError::ConfigError(format!("Corrupt {}: {}", CONVERSATION_FILE, e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_show_notes(&self) -> Result<Option<String>, PodcastError> {
        match fs::read_to_string(self.show_notes_path()) {
            Ok(notes) => Ok(Some(notes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn episode(&self) -> Option<PathBuf> {
        let path = self.episode_path();
        path.is_file().then_some(path)
    }

    /// Remove leftovers of an aborted cycle.
    pub fn discard_scratch(&self) {
        let clip_dir = self.clip_dir();
        if clip_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&clip_dir) {
                tracing::warn!(error = %e, "Failed to remove clip directory");
            }
        }
        let staged = self.staged_episode_path();
        if staged.exists() {
            if let Err(e) = fs::remove_file(&staged) {
                tracing::warn!(error = %e, "Failed to remove staged episode");
            }
        }
    }
}

/// Exclusive advisory lock held for the duration of a generation cycle.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl RunLock {
    fn acquire(path: &Path) -> Result<Self, PodcastError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|_| PodcastError::RunInProgress(path.to_path_buf()))?;

        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Write via a sibling temp file and rename so readers never see partial content.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
