//! Core job data types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resources::HandleId;

/// Stable job identity.
///
/// Derived from the submitted file's name, byte size and modification time
/// rather than from object identity, so re-submitting the same file is
/// recognized and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Compute the identity for a submitted file.
    pub fn for_file(name: &str, size_bytes: u64, modified_ms: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
        hasher.update(size_bytes.to_le_bytes());
        hasher.update(modified_ms.to_le_bytes());
        let digest = hasher.finalize();
        Self(hex_prefix(&digest, 16))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    digest
        .iter()
        .take(bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A file handed to the queue for conversion.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name, e.g. `clip.webm`.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Modification time in milliseconds since the Unix epoch; part of the
    /// identity key.
    pub modified_ms: i64,
    /// MIME type reported by the submitter.
    pub content_type: String,
    /// The bytes themselves.
    pub data: Bytes,
}

impl SourceFile {
    /// Compute this file's job identity.
    pub fn identity(&self) -> JobId {
        JobId::for_file(&self.name, self.size_bytes, self.modified_ms)
    }
}

/// Current state of a job.
///
/// State machine flow:
/// ```text
/// Idle -> Queued -> Converting -> Completed
///                       |
///                       v
///                     Error
///
/// Error/Completed -> Queued (re-run, resets progress and discards the
/// previous output). Removal is allowed in every state except Converting.
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobState {
    /// Created, not yet scheduled.
    Idle,
    /// Will run soon as part of a dispatched batch.
    Queued,
    /// Running against the engine right now.
    Converting,
    /// Finished successfully; an output handle exists.
    Completed,
    /// The run failed; carries the engine diagnostic.
    Error { message: String },
}

impl JobState {
    /// State name for presentation and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Converting => "converting",
            Self::Completed => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// Whether the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error { .. })
    }

    /// Whether the job may be removed in this state. Converting jobs hold
    /// resources the engine still references.
    pub fn is_removable(&self) -> bool {
        !matches!(self, Self::Converting)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One submitted file and its conversion lifecycle.
#[derive(Debug, Clone)]
pub struct Job {
    /// Stable identity.
    pub id: JobId,
    /// Display name of the input file.
    pub display_name: String,
    /// Input size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds, filled in asynchronously by the probe.
    pub duration_secs: Option<f64>,
    /// Lifecycle state.
    pub state: JobState,
    /// Progress percentage, monotonic within one run.
    pub progress_pct: u8,
    /// Input preview handle, created at submission.
    pub input_handle: HandleId,
    /// Output handle; present if and only if the state is Completed.
    pub output_handle: Option<HandleId>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new Idle job for a submitted file.
    pub fn new(source: &SourceFile, input_handle: HandleId) -> Self {
        let now = Utc::now();
        Self {
            id: source.identity(),
            display_name: source.name.clone(),
            size_bytes: source.size_bytes,
            duration_secs: None,
            state: JobState::Idle,
            progress_pct: 0,
            input_handle,
            output_handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the job's updated_at timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Set the state and update the timestamp.
    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.touch();
    }

    /// Begin a new run: progress and any prior error are reset. The caller
    /// is responsible for revoking a superseded output handle first.
    pub fn begin_run(&mut self) {
        self.state = JobState::Converting;
        self.progress_pct = 0;
        self.output_handle = None;
        self.touch();
    }

    /// Mark the run failed with the engine diagnostic.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = JobState::Error {
            message: message.into(),
        };
        self.touch();
    }

    /// Mark the run completed with its fresh output handle. Progress is
    /// forced to 100.
    pub fn complete(&mut self, output_handle: HandleId) {
        self.state = JobState::Completed;
        self.output_handle = Some(output_handle);
        self.progress_pct = 100;
        self.touch();
    }

    /// The download name for this job's output: the original name with its
    /// extension replaced, prefixed to mark it as converted.
    pub fn output_file_name(&self) -> String {
        let stem = std::path::Path::new(&self.display_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        format!("converted_{}.mp4", stem)
    }

    /// Produce the read-only presentation view.
    pub fn snapshot(&self) -> JobSnapshot {
        let error = match &self.state {
            JobState::Error { message } => Some(message.clone()),
            _ => None,
        };
        JobSnapshot {
            id: self.id.clone(),
            name: self.display_name.clone(),
            size_bytes: self.size_bytes,
            duration_secs: self.duration_secs,
            state: self.state.as_str().to_string(),
            progress_pct: self.progress_pct,
            error,
        }
    }
}

/// Read-only view of a job for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Stable identity.
    pub id: JobId,
    /// Display name.
    pub name: String,
    /// Input size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds, if discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// State name.
    pub state: String,
    /// Progress percentage.
    pub progress_pct: u8,
    /// Diagnostic, present only in the error state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
