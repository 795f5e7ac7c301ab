//! Notification building and dispatch.
//!
//! Messages are built as plain data first, then handed to a
//! [`MailTransport`]. Building is pure so the full addressing logic is
//! testable without a relay; dispatch is best-effort per message and never
//! fails the run.

pub mod email;

pub use email::SmtpMailer;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{NotifyConfig, NotifyMode};
use crate::error::Result;
use crate::pipeline::run::RunReport;
use crate::services::SubscriptionMap;
use crate::utils::get_domain;

/// At most this many failures are listed in the operator summary body.
pub const FAILURE_PREVIEW_LIMIT: usize = 20;

/// One outgoing plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery seam. The production implementation is [`SmtpMailer`]; tests
/// substitute a recording transport.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Build all messages for one run according to the configured mode.
///
/// Returns an empty list when nothing warrants mail (no changes, no
/// failures, always-send off) so quiet runs stay quiet.
pub fn build_messages(
    config: &NotifyConfig,
    report: &RunReport,
    subscriptions: Option<&SubscriptionMap>,
    now: DateTime<Utc>,
) -> Vec<EmailMessage> {
    match config.mode {
        NotifyMode::Broadcast => build_operator_summary(config, report, now)
            .into_iter()
            .collect(),
        NotifyMode::PerSubscriber => {
            let mut messages = subscriptions
                .map(|subs| build_subscriber_messages(config, report, subs, now))
                .unwrap_or_default();

            // The always-send toggle keeps an operator heartbeat even in
            // per-subscriber deployments, when an operator address exists.
            if config.always_send {
                messages.extend(build_operator_summary(config, report, now));
            }

            messages
        }
    }
}

/// One summary for the operator: counts, changed sources, and a bounded
/// preview of failures.
fn build_operator_summary(
    config: &NotifyConfig,
    report: &RunReport,
    now: DateTime<Utc>,
) -> Option<EmailMessage> {
    let should_send =
        config.always_send || !report.events.is_empty() || !report.failures.is_empty();
    if !should_send {
        return None;
    }
    let to = config.recipient()?.to_string();

    let mut body = format!(
        "Watch run completed at {}.\n\n\
         Changed: {}\nUnchanged: {}\nBaseline: {}\nFailed: {}\n",
        now.format("%Y-%m-%d %H:%M UTC"),
        report.changed,
        report.unchanged,
        report.baseline,
        report.failed,
    );

    if !report.events.is_empty() {
        body.push_str("\nChanged sources:\n");
        for event in &report.events {
            if event.label.is_empty() {
                body.push_str(&format!("- {}\n", event.url));
            } else {
                body.push_str(&format!("- {}\n  {}\n", event.label, event.url));
            }
        }
    }

    if !report.failures.is_empty() {
        let shown = report.failures.len().min(FAILURE_PREVIEW_LIMIT);
        body.push_str(&format!(
            "\nFailures (showing {} of {}):\n",
            shown,
            report.failures.len()
        ));
        for failure in report.failures.iter().take(FAILURE_PREVIEW_LIMIT) {
            body.push_str(&format!("- {} ({}): {}\n", failure.label, failure.url, failure.error));
        }
        if report.failures.len() > FAILURE_PREVIEW_LIMIT {
            body.push_str(&format!(
                "... and {} more\n",
                report.failures.len() - FAILURE_PREVIEW_LIMIT
            ));
        }
    }

    Some(EmailMessage {
        to,
        subject: format!(
            "{} {} changed, {} failed",
            config.subject_prefix, report.changed, report.failed
        ),
        body,
    })
}

/// One message per matched subscriber, containing only the labels that
/// subscriber registered for. Never batches recipients into one message and
/// never mentions failures (those belong to the operator).
fn build_subscriber_messages(
    config: &NotifyConfig,
    report: &RunReport,
    subscriptions: &SubscriptionMap,
    now: DateTime<Utc>,
) -> Vec<EmailMessage> {
    // Label -> changed URLs, one entry per institution.
    let mut by_label: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for event in &report.events {
        by_label
            .entry(event.label.as_str())
            .or_default()
            .push(event.url.as_str());
    }

    // Recipient -> (label -> urls), restricted to their subscriptions.
    let mut by_recipient: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    for (&label, urls) in &by_label {
        let Some(recipients) = subscriptions.get(label) else {
            continue;
        };
        for recipient in recipients {
            by_recipient
                .entry(recipient.as_str())
                .or_default()
                .insert(label, urls.clone());
        }
    }

    let timestamp = now.format("%Y-%m-%d %H:%M UTC");
    let mut messages = Vec::with_capacity(by_recipient.len());

    for (recipient, labels) in by_recipient {
        let mut body = format!("Updates detected for your subscribed schools ({timestamp}):\n");
        for (label, urls) in &labels {
            body.push_str(&format!("\n[{label}]\n"));
            for url in urls {
                match get_domain(url) {
                    Some(host) => body.push_str(&format!("- {host}\n  {url}\n")),
                    None => body.push_str(&format!("- {url}\n")),
                }
            }
        }
        body.push_str(
            "\nAlways confirm against the official site. \
             Contact the operator to pause or cancel this subscription.\n",
        );

        let to = config
            .override_recipient
            .clone()
            .unwrap_or_else(|| recipient.to_string());

        messages.push(EmailMessage {
            to,
            subject: format!(
                "{} {} school(s) have new postings",
                config.subject_prefix,
                labels.len()
            ),
            body,
        });
    }

    messages
}

/// Send every message, counting successes and failures in the report.
///
/// A failed send is logged and recorded; it does not stop delivery to the
/// remaining recipients and does not fail the run.
pub async fn dispatch(
    transport: &dyn MailTransport,
    messages: &[EmailMessage],
    report: &mut RunReport,
) {
    for message in messages {
        match transport.send(message).await {
            Ok(()) => {
                report.emails_sent += 1;
                log::info!("Sent notification to {}", message.to);
            }
            Err(e) => {
                report.emails_failed += 1;
                log::error!("Failed to send notification to {}: {}", message.to, e);
            }
        }
    }
}
