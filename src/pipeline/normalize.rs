// src/pipeline/normalize.rs

//! Content normalization.
//!
//! Raw HTML hashes are useless for change detection: scripts, counters and
//! widgets differ on every fetch. This module reduces a response body to the
//! part that actually carries announcements, so the fingerprint only moves
//! when the content does.
//!
//! Feed bodies keep their entry list (`title<TAB>link` per entry). Page
//! bodies keep their link list, filtered to links with real anchor text.
//! When neither yields anything, the visible text with collapsed whitespace
//! is used instead. Output is capped to bound fingerprint cost and to keep
//! trailing boilerplate from churning the digest.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector, node::Node};
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::NormalizeConfig;

fn anchor_selector() -> &'static Selector {
    static ANCHOR: OnceLock<Selector> = OnceLock::new();
    ANCHOR.get_or_init(|| Selector::parse("a[href]").expect("static selector"))
}

fn blank_runs() -> &'static Regex {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    BLANK_RUNS.get_or_init(|| Regex::new(r"\n{2,}").expect("static regex"))
}

/// Normalize a response body into noise-resistant text.
///
/// Pure and deterministic: the same body always yields the same output.
pub fn normalize(body: &str, feed_hint: bool, config: &NormalizeConfig) -> String {
    let text = if feed_hint {
        normalize_feed(body)
    } else {
        normalize_page(body, config)
    };

    truncate_chars(&text, config.max_chars)
}

// --- Feed branch ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default, rename = "entry")]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<AtomText>,
    #[serde(default, rename = "link")]
    links: Vec<AtomLink>,
}

/// Atom text constructs may carry a `type` attribute; only the text matters.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(default, rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(default, rename = "@href")]
    href: Option<String>,
}

/// Emit one `title<TAB>link` line per feed entry, in document order.
/// Falls back to collapsed raw text when no entries parse structurally.
fn normalize_feed(body: &str) -> String {
    let entries = parse_rss_entries(body).or_else(|| parse_atom_entries(body));

    match entries {
        Some(lines) if !lines.is_empty() => lines.join("\n"),
        _ => collapse_text(body),
    }
}

fn parse_rss_entries(body: &str) -> Option<Vec<String>> {
    let rss: Rss = quick_xml::de::from_str(body).ok()?;
    let lines: Vec<String> = rss
        .channel
        .items
        .iter()
        .filter_map(|item| {
            entry_line(
                item.title.as_deref().unwrap_or(""),
                item.link.as_deref().unwrap_or(""),
            )
        })
        .collect();
    Some(lines)
}

fn parse_atom_entries(body: &str) -> Option<Vec<String>> {
    let feed: AtomFeed = quick_xml::de::from_str(body).ok()?;
    let lines: Vec<String> = feed
        .entries
        .iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .as_ref()
                .and_then(|t| t.value.as_deref())
                .unwrap_or("");
            let link = entry
                .links
                .first()
                .and_then(|l| l.href.as_deref())
                .unwrap_or("");
            entry_line(title, link)
        })
        .collect();
    Some(lines)
}

fn entry_line(title: &str, link: &str) -> Option<String> {
    let title = collapse_inner(title);
    let link = link.trim();
    if title.is_empty() && link.is_empty() {
        return None;
    }
    Some(format!("{title}\t{link}"))
}

// --- Page branch ---

/// Emit one `text<TAB>href` line per qualifying link. Pages in scope are
/// mostly posting lists, so the link list is the content; nav chrome, ads
/// and footers change without moving it.
fn normalize_page(body: &str, config: &NormalizeConfig) -> String {
    let document = Html::parse_document(body);

    let mut lines = Vec::new();
    for anchor in document.select(anchor_selector()) {
        let text = collapse_inner(&anchor.text().collect::<String>());
        if text.graphemes(true).count() < config.min_link_text {
            continue;
        }

        let href = anchor.value().attr("href").unwrap_or("").trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.to_ascii_lowercase().starts_with("javascript:")
        {
            continue;
        }

        lines.push(format!("{text}\t{href}"));
    }

    if lines.is_empty() {
        return collapse_text(&visible_text(&document));
    }

    lines.join("\n")
}

/// Collect text content, skipping script/style/noscript subtrees.
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    let mut stack = vec![document.tree.root()];

    while let Some(node) = stack.pop() {
        if let Node::Element(element) = node.value() {
            if matches!(element.name(), "script" | "style" | "noscript") {
                continue;
            }
        }
        if let Node::Text(text) = node.value() {
            out.push_str(&text.text);
            out.push('\n');
        }

        let mut children: Vec<_> = node.children().collect();
        children.reverse();
        stack.extend(children);
    }

    out
}

// --- Whitespace handling ---

/// Collapse inner whitespace runs to single spaces.
fn collapse_inner(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse horizontal whitespace per line and runs of blank lines to one.
fn collapse_text(raw: &str) -> String {
    let lines: Vec<String> = raw.lines().map(collapse_inner).collect();
    let joined = lines.join("\n");
    blank_runs()
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Cap output length on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
