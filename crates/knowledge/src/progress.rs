//! Structured progress reporting for indexing runs.
//!
//! The indexer walks a fixed sequence of phases per run. Every transition is
//! logged at debug level and, when a callback is registered, forwarded to it
//! so front ends can render incremental feedback.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Indexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerPhase {
    Idle,
    Clearing,
    Scanning,
    Extracting,
    Chunking,
    Embedding,
    Persisting,
}

impl IndexerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Clearing => "clearing",
            Self::Scanning => "scanning",
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Persisting => "persisting",
        }
    }
}

impl std::fmt::Display for IndexerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted on every phase transition.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: IndexerPhase,

    /// Document being worked on, if any
    pub document: Option<String>,

    /// Documents finished so far
    pub current: usize,

    /// Documents in this run, once scanning is done
    pub total: Option<usize>,

    /// Seconds since the run started
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        match &self.document {
            Some(doc) => format!("[{}] {} {}", self.phase, progress, doc),
            None => format!("[{}] {}", self.phase, progress),
        }
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter that logs transitions and forwards them to a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new reporter with a callback.
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Create a reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    /// Announce entry into `phase`.
    pub fn enter(
        &self,
        phase: IndexerPhase,
        document: Option<&str>,
        current: usize,
        total: Option<usize>,
    ) {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();

        tracing::debug!(
            phase = %phase,
            document = document.unwrap_or(""),
            current,
            total = ?total,
            elapsed_secs,
            "Indexer phase"
        );

        if let Some(callback) = &self.callback {
            callback(ProgressEvent {
                phase,
                document: document.map(str::to_string),
                current,
                total,
                elapsed_secs,
            });
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
