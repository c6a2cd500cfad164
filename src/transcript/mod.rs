//! Per-user chat transcript persistence
//!
//! One JSON file per user under the storage directory, holding the ordered
//! utterance history. Whole-file read and overwrite, no locking: a single
//! in-flight turn per user is assumed (enforced by the voice session
//! controller, not here).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Speaker role for one utterance, lowercase on the wire to match the
/// chat-completions message format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn's message, tagged with speaker role. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub content: String,
}

impl Utterance {
    /// Create a user utterance
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant utterance
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered utterance history for one user
pub type Transcript = Vec<Utterance>;

/// Flat-file transcript store, one JSON file per user
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Storage directory root
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the transcript for a user
    ///
    /// Returns an empty transcript if no history file exists.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn read(&self, user_id: &str) -> Result<Transcript> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let transcript = serde_json::from_str(&content)
            .map_err(|e| Error::Transcript(format!("corrupt history for {user_id}: {e}")))?;
        Ok(transcript)
    }

    /// Write the full transcript for a user, overwriting any existing file
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn write(&self, user_id: &str, transcript: &Transcript) -> Result<()> {
        let path = self.path_for(user_id);
        let json = serde_json::to_string_pretty(transcript)?;
        std::fs::write(&path, json)?;

        tracing::debug!(
            user_id,
            utterances = transcript.len(),
            "transcript persisted"
        );
        Ok(())
    }

    /// File path for a user's history
    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_user_id(user_id)))
    }
}

/// Reduce an opaque user ID to a filename-safe form
///
/// User IDs arrive from clients verbatim; stripping everything outside
/// `[A-Za-z0-9_-]` keeps path separators and dots out of the filename.
fn sanitize_user_id(user_id: &str) -> String {
    let cleaned: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}
