//! End-to-end pipeline tests: fetch against a local mock server, detect
//! changes across runs, persist state, build and dispatch notifications.

use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pagewatch::config::{Config, NotifyMode};
use pagewatch::error::Result;
use pagewatch::notify::{self, EmailMessage, MailTransport};
use pagewatch::pipeline;
use pagewatch::storage::StateStore;

const PAGE_V1: &str = r#"<html><body>
    <ul>
      <li><a href="/news/1">Admission results announced</a></li>
      <li><a href="/news/2">Scholarship deadline extended</a></li>
    </ul>
    <footer>Rendered 2026-08-07 01:00:00</footer>
    </body></html>"#;

const PAGE_V1_NOISY: &str = r#"<html><body>
    <ul>
      <li><a href="/news/1">Admission results announced</a></li>
      <li><a href="/news/2">Scholarship deadline extended</a></li>
    </ul>
    <footer>Rendered 2026-08-07 02:30:00</footer>
    </body></html>"#;

const PAGE_V2: &str = r#"<html><body>
    <ul>
      <li><a href="/news/1">Admission results announced</a></li>
      <li><a href="/news/2">Scholarship deadline extended</a></li>
      <li><a href="/news/3">Supplementary admission round opened</a></li>
    </ul>
    <footer>Rendered 2026-08-07 03:00:00</footer>
    </body></html>"#;

struct RecordingTransport {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test configuration rooted in a temp directory, with fast timeouts.
fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.sources_file = dir.path().join("sources.txt").display().to_string();
    config.paths.state_file = dir.path().join("state.json").display().to_string();
    config.paths.subscriptions_file = dir.path().join("subscriptions.toml").display().to_string();
    config.fetcher.timeout_secs = 2;
    config.fetcher.retry.max_retries = 0;
    config.fetcher.retry.initial_backoff_ms = 10;
    config
}

fn write_sources(config: &Config, lines: &[(&str, String)]) {
    let content: String = lines
        .iter()
        .map(|(label, url)| format!("{label}\t{url}\n"))
        .collect();
    fs::write(&config.paths.sources_file, content).unwrap();
}

fn write_subscriptions(config: &Config, email: &str, schools: &str) {
    fs::write(
        &config.paths.subscriptions_file,
        format!(
            "[[subscriber]]\nemail = \"{email}\"\nschools = \"{schools}\"\nstatus = \"ACTIVE\"\n"
        ),
    )
    .unwrap();
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn three_run_lifecycle_emits_exactly_one_change() {
    let server = MockServer::start().await;
    mount_page(&server, "/news", PAGE_V1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_sources(&config, &[("Alpha University", format!("{}/news", server.uri()))]);
    write_subscriptions(&config, "subscriber@example.com", "Alpha University");

    // Run 1: empty state, so the fetch establishes a baseline. No mail.
    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.baseline, 1);
    assert_eq!(output.report.changed, 0);
    assert!(output.messages.is_empty());

    let store = StateStore::load(&config.paths.state_file).await.unwrap();
    let record = store.get(&format!("{}/news", server.uri())).unwrap();
    assert!(record.fingerprint.is_some());

    // Run 2: identical content apart from footer noise. Still no mail.
    server.reset().await;
    mount_page(&server, "/news", PAGE_V1_NOISY).await;

    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.unchanged, 1);
    assert_eq!(output.report.changed, 0);
    assert!(output.messages.is_empty());

    // Run 3: a new list entry appeared. Exactly one event, one message.
    server.reset().await;
    mount_page(&server, "/news", PAGE_V2).await;

    let mut output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.changed, 1);
    assert_eq!(output.report.events.len(), 1);
    assert_eq!(output.report.events[0].label, "Alpha University");

    assert_eq!(output.messages.len(), 1);
    let message = &output.messages[0];
    assert_eq!(message.to, "subscriber@example.com");
    assert!(message.body.contains("Alpha University"));
    assert!(message.body.contains(&format!("{}/news", server.uri())));

    let transport = RecordingTransport::new();
    notify::dispatch(&transport, &output.messages, &mut output.report).await;
    assert_eq!(output.report.emails_sent, 1);
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn timed_out_source_does_not_disturb_the_others() {
    let server = MockServer::start().await;
    mount_page(&server, "/a", PAGE_V1).await;
    mount_page(&server, "/c", PAGE_V2).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PAGE_V1, "text/html")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.fetcher.timeout_secs = 1;
    config.notify.mode = NotifyMode::Broadcast;
    config.notify.operator_email = Some("ops@example.com".into());
    write_sources(
        &config,
        &[
            ("Alpha University", format!("{}/a", server.uri())),
            ("Beta College", format!("{}/b", server.uri())),
            ("Gamma Institute", format!("{}/c", server.uri())),
        ],
    );

    let output = pipeline::execute(&config).await.unwrap();

    assert_eq!(output.report.baseline, 2);
    assert_eq!(output.report.failed, 1);
    assert_eq!(output.report.failures[0].label, "Beta College");

    // State reflects all three outcomes.
    let store = StateStore::load(&config.paths.state_file).await.unwrap();
    assert_eq!(store.len(), 3);
    let failed = store.get(&format!("{}/b", server.uri())).unwrap();
    assert!(failed.fingerprint.is_none());
    assert!(failed.last_error.is_some());
    let ok = store.get(&format!("{}/a", server.uri())).unwrap();
    assert!(ok.fingerprint.is_some());

    // Broadcast summary goes to the operator and mentions the failure.
    assert_eq!(output.messages.len(), 1);
    assert_eq!(output.messages[0].to, "ops@example.com");
    assert!(output.messages[0].body.contains("Beta College"));
}

#[tokio::test]
async fn failed_fetch_preserves_fingerprint_across_runs() {
    let server = MockServer::start().await;
    mount_page(&server, "/news", PAGE_V1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_sources(&config, &[("Alpha University", format!("{}/news", server.uri()))]);
    write_subscriptions(&config, "subscriber@example.com", "Alpha University");

    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.baseline, 1);

    let store = StateStore::load(&config.paths.state_file).await.unwrap();
    let url = format!("{}/news", server.uri());
    let fingerprint_before = store.get(&url).unwrap().fingerprint.clone();

    // Source goes down for a run.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.failed, 1);
    assert!(output.messages.is_empty());

    let store = StateStore::load(&config.paths.state_file).await.unwrap();
    let record = store.get(&url).unwrap();
    assert_eq!(record.fingerprint, fingerprint_before);
    assert!(record.last_error.is_some());

    // Recovery with identical content: unchanged, not a fresh baseline.
    server.reset().await;
    mount_page(&server, "/news", PAGE_V1).await;

    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.unchanged, 1);
    assert_eq!(output.report.changed, 0);
    assert!(output.messages.is_empty());
}

/// Regression guard for `validate` + missing sources file interplay used by
/// the CLI: a missing source list must surface as a configuration error.
#[tokio::test]
async fn missing_source_list_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    // Note: no sources file written. Subscriptions present and valid.
    write_subscriptions(&config, "subscriber@example.com", "Alpha University");

    let err = pipeline::execute(&config).await.unwrap_err();
    assert!(matches!(err, pagewatch::error::AppError::Config(_)));
}

#[tokio::test]
async fn sources_sharing_a_label_group_into_one_subscriber_message() {
    let server = MockServer::start().await;
    mount_page(&server, "/grad", PAGE_V1).await;
    mount_page(&server, "/undergrad", PAGE_V1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    write_sources(
        &config,
        &[
            ("Alpha University", format!("{}/grad", server.uri())),
            ("Alpha University", format!("{}/undergrad", server.uri())),
        ],
    );
    write_subscriptions(&config, "subscriber@example.com", "Alpha University");

    // Baseline both boards.
    pipeline::execute(&config).await.unwrap();

    // Both boards change in the same run.
    server.reset().await;
    mount_page(&server, "/grad", PAGE_V2).await;
    mount_page(&server, "/undergrad", PAGE_V2).await;

    let output = pipeline::execute(&config).await.unwrap();
    assert_eq!(output.report.changed, 2);

    // One recipient, one message, both URLs under the one label.
    assert_eq!(output.messages.len(), 1);
    let body = &output.messages[0].body;
    assert!(body.contains(&format!("{}/grad", server.uri())));
    assert!(body.contains(&format!("{}/undergrad", server.uri())));
    assert!(output.messages[0].subject.contains("1 school(s)"));
}
