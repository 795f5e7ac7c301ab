// src/pipeline/detect.rs

//! Change detection.
//!
//! The only branching logic that decides whether anyone gets notified.
//! Per URL, given the stored record and the fresh outcome:
//!
//! - fetch failed        -> `Failed`: fingerprint untouched, error recorded
//! - no stored print     -> `Baseline`: store fresh print, never notify
//! - stored == fresh     -> `Unchanged`
//! - stored != fresh     -> `Changed`: store fresh print, emit event

use chrono::{DateTime, Utc};

use crate::models::{ChangeEvent, FetchOutcome, SourceState};
use crate::storage::StateStore;

/// Result of applying one outcome to the store.
#[derive(Debug, Clone)]
pub struct Detection {
    pub state: SourceState,
    pub event: Option<ChangeEvent>,
}

/// Apply one fetch outcome to the store, classifying the source and
/// updating its record in place.
pub fn apply(store: &mut StateStore, outcome: &FetchOutcome, now: DateTime<Utc>) -> Detection {
    match outcome {
        FetchOutcome::Failure { source, error } => {
            let record = store.entry(&source.url);
            record.last_checked_at = now;
            record.last_error = Some(error.clone());

            Detection {
                state: SourceState::Failed,
                event: None,
            }
        }

        FetchOutcome::Success {
            source,
            fingerprint,
        } => {
            let record = store.entry(&source.url);
            record.last_checked_at = now;
            record.last_error = None;

            let previous = record.fingerprint.clone();
            let state = match previous.as_deref() {
                None => {
                    record.fingerprint = Some(fingerprint.clone());
                    SourceState::Baseline
                }
                Some(stored) if stored == fingerprint.as_str() => SourceState::Unchanged,
                Some(_) => {
                    record.fingerprint = Some(fingerprint.clone());
                    SourceState::Changed
                }
            };

            let event = (state == SourceState::Changed).then(|| ChangeEvent {
                label: source.label.clone(),
                url: source.url.clone(),
            });

            Detection { state, event }
        }
    }
}
