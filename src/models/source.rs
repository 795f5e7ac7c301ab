//! Watched source registry.
//!
//! Parses the line-oriented source list: one `label<TAB-or-whitespace>URL`
//! pair per line, `#` comments and blank lines ignored.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// One monitored (label, URL) pair. Identity is the URL; labels may repeat
/// across several URLs belonging to the same institution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchSource {
    /// Institution label (may be empty for URL-only lines)
    pub label: String,

    /// Page or feed URL
    pub url: String,
}

impl WatchSource {
    /// Load all sources from a line-oriented list file.
    ///
    /// A missing file is a configuration error; malformed lines are skipped
    /// with a warning so one bad line cannot abort the whole run.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<WatchSource>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::config(format!("Source list not found: {}", path.display()))
            } else {
                AppError::Io(e)
            }
        })?;

        Ok(content.lines().filter_map(Self::parse_line).collect())
    }

    /// Parse one source list line, returning `None` for non-source lines.
    ///
    /// A tab is the preferred separator (labels may contain spaces); without
    /// one the line splits at its first whitespace run. A line holding only
    /// a URL gets an empty label.
    fn parse_line(line: &str) -> Option<WatchSource> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (label, url) = match line.split_once('\t') {
            Some((label, url)) => (label.trim(), url.trim()),
            None => match line.split_once(char::is_whitespace) {
                Some((label, url)) => (label.trim(), url.trim()),
                None => ("", line),
            },
        };

        if !is_http_url(url) {
            log::warn!("Skipping source line without a usable URL: {line}");
            return None;
        }

        Some(WatchSource {
            label: label.to_string(),
            url: url.to_string(),
        })
    }
}

/// A URL is usable only with an explicit http/https scheme.
fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
