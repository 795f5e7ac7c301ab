// src/services/subscriptions.rs

//! Subscription resolution.
//!
//! Maps institution labels to the set of recipients who subscribed to them.
//! Only `ACTIVE` rows count; the schools column is a comma-delimited label
//! list (full-width commas tolerated, since rows are often pasted from
//! spreadsheets using CJK punctuation).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{SubscriberRow, SubscriptionsFile};

/// Label -> set of recipient addresses. Ordered maps keep message building
/// deterministic.
pub type SubscriptionMap = BTreeMap<String, BTreeSet<String>>;

/// Loads and resolves the subscriptions file.
#[derive(Debug)]
pub struct SubscriptionResolver {
    rows: Vec<SubscriberRow>,
}

impl SubscriptionResolver {
    /// Load subscriber rows from a TOML file.
    ///
    /// A missing file or a row missing a required column is a configuration
    /// error: without a readable subscriber list, per-subscriber mode cannot
    /// address anyone.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::config(format!("Subscriptions file not found: {}", path.display()))
            } else {
                AppError::Io(e)
            }
        })?;

        let file: SubscriptionsFile = toml::from_str(&content).map_err(|e| {
            AppError::config(format!(
                "Invalid subscriptions file {}: {e}",
                path.display()
            ))
        })?;

        Ok(Self {
            rows: file.subscribers,
        })
    }

    /// Build a resolver directly from rows (used by tests and callers that
    /// already hold the data).
    pub fn from_rows(rows: Vec<SubscriberRow>) -> Self {
        Self { rows }
    }

    /// Resolve rows into a label -> recipients mapping.
    ///
    /// Rows that are not ACTIVE, have an empty email, or list no labels are
    /// skipped silently. A label nobody subscribed to is simply absent.
    pub fn resolve(&self) -> SubscriptionMap {
        let mut map = SubscriptionMap::new();

        for row in &self.rows {
            if !row.status.trim().eq_ignore_ascii_case("ACTIVE") {
                continue;
            }
            let email = row.email.trim();
            if email.is_empty() {
                continue;
            }

            for label in split_labels(&row.schools) {
                map.entry(label).or_default().insert(email.to_string());
            }
        }

        map
    }
}

/// Split a schools column into trimmed labels, tolerating full-width commas.
fn split_labels(raw: &str) -> Vec<String> {
    raw.replace('\u{ff0c}', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
