//! Per-run result types.

use crate::models::WatchSource;

/// Raw payload of one successful fetch, before normalization.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// The source this body was fetched from
    pub source: WatchSource,

    /// Decoded response body
    pub body: String,

    /// Whether the response looked like an RSS/Atom feed
    pub feed_hint: bool,
}

/// Final per-source result of one run. Exactly one branch is populated:
/// either a fingerprint was computed or an error was recorded.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Fetch and normalization succeeded
    Success {
        source: WatchSource,
        fingerprint: String,
    },

    /// Fetch failed after retries; error text captured for the record
    Failure { source: WatchSource, error: String },
}

impl FetchOutcome {
    /// The source this outcome belongs to.
    pub fn source(&self) -> &WatchSource {
        match self {
            FetchOutcome::Success { source, .. } => source,
            FetchOutcome::Failure { source, .. } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Classification of one source after comparing against stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// First successful fetch of this URL; fingerprint stored, no notification
    Baseline,
    /// Stored fingerprint matches the fresh one
    Unchanged,
    /// Stored fingerprint differs; notification due
    Changed,
    /// Fetch failed; stored fingerprint untouched
    Failed,
}

/// Emitted when a source with a previously stored fingerprint changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub label: String,
    pub url: String,
}
