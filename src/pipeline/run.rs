// src/pipeline/run.rs

//! One full watch run: load sources and state, fetch everything, detect
//! changes, persist state, build notifications.
//!
//! Dispatch is left to the caller so a dry run (and the test suite) can
//! inspect the built messages without a mail relay.

use chrono::{DateTime, Utc};

use crate::config::{Config, NotifyMode};
use crate::error::Result;
use crate::models::{ChangeEvent, FetchOutcome, SourceState, WatchSource};
use crate::notify::{self, EmailMessage};
use crate::pipeline::detect::{self, Detection};
use crate::pipeline::fingerprint::fingerprint;
use crate::pipeline::normalize::normalize;
use crate::services::{PageFetcher, SubscriptionResolver};
use crate::storage::StateStore;

/// One source that failed this run, for the operator summary.
#[derive(Debug, Clone)]
pub struct FailureEntry {
    pub label: String,
    pub url: String,
    pub error: String,
}

/// Aggregate of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub baseline: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub failed: usize,
    pub events: Vec<ChangeEvent>,
    pub failures: Vec<FailureEntry>,
    pub emails_sent: usize,
    pub emails_failed: usize,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            baseline: 0,
            unchanged: 0,
            changed: 0,
            failed: 0,
            events: Vec::new(),
            failures: Vec::new(),
            emails_sent: 0,
            emails_failed: 0,
        }
    }

    /// Total sources accounted for.
    pub fn total(&self) -> usize {
        self.baseline + self.unchanged + self.changed + self.failed
    }

    fn tally(&mut self, detection: Detection, outcome: &FetchOutcome) {
        match detection.state {
            SourceState::Baseline => self.baseline += 1,
            SourceState::Unchanged => self.unchanged += 1,
            SourceState::Changed => self.changed += 1,
            SourceState::Failed => {
                self.failed += 1;
                if let FetchOutcome::Failure { source, error } = outcome {
                    self.failures.push(FailureEntry {
                        label: source.label.clone(),
                        url: source.url.clone(),
                        error: error.clone(),
                    });
                }
            }
        }

        if let Some(event) = detection.event {
            self.events.push(event);
        }
    }

    /// Fetches resolve in completion order; sort so reports and message
    /// bodies come out the same for the same set of outcomes.
    fn sort_for_output(&mut self) {
        self.events
            .sort_by(|a, b| (&a.label, &a.url).cmp(&(&b.label, &b.url)));
        self.failures
            .sort_by(|a, b| (&a.label, &a.url).cmp(&(&b.label, &b.url)));
    }

    /// Operator-facing summary, logged even when no mail goes out.
    pub fn log_summary(&self) {
        log::info!(
            "Run summary: {} changed, {} unchanged, {} baseline, {} failed ({} total)",
            self.changed,
            self.unchanged,
            self.baseline,
            self.failed,
            self.total()
        );
        if self.emails_sent + self.emails_failed > 0 {
            log::info!(
                "Emails: {} sent, {} failed",
                self.emails_sent,
                self.emails_failed
            );
        }
        if self.changed == 0 && self.failed == 0 {
            log::info!("No updates.");
        }
    }
}

/// Everything the caller needs after a run: the report plus the messages
/// that are due for dispatch.
#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
    pub messages: Vec<EmailMessage>,
}

/// Execute one run up to (but not including) mail dispatch.
///
/// State is persisted before this returns, so delivery problems can never
/// cost the run its fetch results.
pub async fn execute(config: &Config) -> Result<RunOutput> {
    let started_at = Utc::now();

    let sources = WatchSource::load_all(&config.paths.sources_file)?;
    log::info!(
        "Loaded {} source(s) from {}",
        sources.len(),
        config.paths.sources_file
    );

    // Load the subscriber list before fetching so a broken file fails fast.
    let subscriptions = match config.notify.mode {
        NotifyMode::PerSubscriber => {
            Some(SubscriptionResolver::load(&config.paths.subscriptions_file)?.resolve())
        }
        NotifyMode::Broadcast => None,
    };

    let mut store = StateStore::load(&config.paths.state_file).await?;
    let fetcher = PageFetcher::new(&config.fetcher)?;
    let results = fetcher.fetch_all(&sources).await;

    // All fetches have resolved; normalization, fingerprinting and detection
    // run sequentially on the main task.
    let now = Utc::now();
    let mut report = RunReport::new(started_at);
    for result in results {
        let outcome = match result {
            Ok(snapshot) => {
                let normalized = normalize(&snapshot.body, snapshot.feed_hint, &config.normalize);
                FetchOutcome::Success {
                    source: snapshot.source,
                    fingerprint: fingerprint(&normalized),
                }
            }
            Err(failure) => FetchOutcome::Failure {
                source: failure.source,
                error: failure.error,
            },
        };

        let detection = detect::apply(&mut store, &outcome, now);
        report.tally(detection, &outcome);
    }
    report.sort_for_output();

    // Persist exactly once, after every outcome landed, failures included.
    store.save().await?;
    log::info!(
        "State saved: {} record(s) to {}",
        store.len(),
        config.paths.state_file
    );

    let messages = notify::build_messages(&config.notify, &report, subscriptions.as_ref(), now);
    Ok(RunOutput { report, messages })
}
