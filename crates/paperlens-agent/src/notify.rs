//! Digests of new papers and high-confidence associations, delivered to a
//! webhook or the log.

use async_trait::async_trait;
use paperlens_ingestion::PaperMetadata;
use paperlens_kg::{to_high_confidence_subset, to_table, AggregatedKnowledgeBase};
use tracing::info;

const ABSTRACT_PREVIEW_CHARS: usize = 300;
const RULE: &str = "============================================================";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()>;
    fn name(&self) -> &str;
}

/// Posts `{"text": "<subject>\n\n<body>"}`, the payload Slack-style
/// incoming webhooks accept.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({ "text": format!("{subject}\n\n{body}") });
        let resp = self.client.post(&self.url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Webhook returned {status}: {}", text.chars().take(200).collect::<String>());
        }
        info!(subject, "Notification sent to webhook");
        Ok(())
    }

    fn name(&self) -> &str { "webhook" }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        info!("{subject}\n{body}");
        Ok(())
    }

    fn name(&self) -> &str { "log" }
}

/// Webhook when a URL is configured, the log otherwise.
pub fn build_notifier(webhook_url: Option<String>) -> Box<dyn Notifier> {
    match webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url)),
        None      => Box::new(LogNotifier),
    }
}

// ── Digests ───────────────────────────────────────────────────────────────────

pub fn new_papers_digest(papers: &[PaperMetadata], query: &str) -> (String, String) {
    let subject = format!("Paperlens: {} new paper(s) found", papers.len());

    let mut body = format!("Found {} new paper(s) matching your search.\n", papers.len());
    if !query.is_empty() {
        body.push_str(&format!("Search query: {query}\n"));
    }
    body.push_str(RULE);
    body.push('\n');

    for (i, paper) in papers.iter().enumerate() {
        body.push_str(&format!("\n{}. {}\n\n", i + 1, paper.title));
        body.push_str(&format!("Authors: {}\n", paper.short_authors(3)));
        body.push_str(&format!("Journal: {}\n", paper.journal.as_deref().unwrap_or("Unknown")));
        body.push_str(&format!("Year: {}\n", paper.year.as_deref().unwrap_or("Unknown")));
        body.push_str(&format!("PMID: {}\n", paper.pmid));
        body.push_str(&format!("URL: {}\n", paper.url));
        if let Some(abstract_text) = paper.abstract_text.as_deref() {
            body.push('\n');
            body.push_str(&preview(abstract_text, ABSTRACT_PREVIEW_CHARS));
            body.push('\n');
        }
        body.push('\n');
        body.push_str(RULE);
        body.push('\n');
    }

    (subject, body)
}

/// Digest of the Moderate and High associations in `kb`, which is expected
/// to be scored.
pub fn high_confidence_digest(kb: &AggregatedKnowledgeBase) -> (String, String) {
    let rows = to_table(&to_high_confidence_subset(kb));

    let subject = format!("Paperlens: {} high-confidence association(s)", rows.len());

    let mut body = format!(
        "{} biomarker(s), {} association(s), {} supported by more than one paper.\n",
        kb.records.len(),
        kb.association_count(),
        rows.len(),
    );
    body.push_str(RULE);
    body.push('\n');
    for row in &rows {
        body.push_str(&format!(
            "{} / {}: {} ({} papers)\n",
            row.biomarker, row.disease, row.evidence_level, row.paper_count
        ));
    }
    (subject, body)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
