//! Paper summarisation: chunked text in, `PaperSummary` out.
//!
//! Only the first chunk is sent, with a "(part 1 of N)" note when the paper
//! was split; `chunks_processed` records N. The outcome is always a summary.
//! Failures are carried in its status rather than raised, so one bad paper
//! never stops a batch.

use std::sync::Arc;
use std::time::Duration;

use paperlens_common::{PaperStatus, PaperSummary};
use tracing::{debug, instrument, warn};

use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};

/// Characters of an unparseable response kept for diagnosis.
const RAW_RESPONSE_KEEP: usize = 500;

const SYSTEM_PROMPT: &str = "You are a biomedical research analyst. You read research papers and \
report their content as strict JSON, with no prose before or after the JSON object.";

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Exponential backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_wait
            .saturating_mul(factor)
            .clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SummariserConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry: RetryPolicy,
}

impl Default for SummariserConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2_000,
            temperature: 0.1,
            retry: RetryPolicy::default(),
        }
    }
}

// ── Summariser ────────────────────────────────────────────────────────────────

pub struct PaperSummariser {
    backend: Arc<dyn LlmBackend>,
    config: SummariserConfig,
}

impl PaperSummariser {
    pub fn new(backend: Arc<dyn LlmBackend>, config: SummariserConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &dyn LlmBackend {
        self.backend.as_ref()
    }

    /// Summarise one paper given its text chunks.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn summarise(&self, filename: &str, chunks: &[String]) -> PaperSummary {
        let provider = self.backend.provider().as_str().to_string();

        let Some(first) = chunks.iter().find(|c| !c.trim().is_empty()) else {
            let mut s = PaperSummary::failed(filename, PaperStatus::ExtractionFailed, "no extractable text");
            s.api_provider = Some(provider);
            return s;
        };

        let req = LlmRequest {
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(build_prompt(first, chunks.len())),
            ],
            model: None,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
        };

        let response = match self.complete_with_retry(req).await {
            Ok(r) => r,
            Err(e) => {
                warn!(filename, error = %e, "Summarisation request failed");
                let mut s = PaperSummary::failed(filename, PaperStatus::ApiError, e.to_string());
                s.api_provider = Some(provider);
                return s;
            }
        };

        debug!(
            filename,
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "Summary received"
        );

        let mut summary = match parse_summary(&response.content) {
            Ok(s) => s,
            Err(e) => {
                warn!(filename, error = %e, "Summary response is not valid JSON");
                let mut s = PaperSummary::failed(filename, PaperStatus::JsonError, e.to_string());
                s.raw_response = Some(clean_json_response(&response.content).chars().take(RAW_RESPONSE_KEEP).collect());
                s.api_provider = Some(provider);
                return s;
            }
        };

        summary.filename = filename.to_string();
        summary.status = PaperStatus::Success;
        summary.api_provider = Some(provider);
        summary.chunks_processed = Some(chunks.len());
        summary.error = None;
        summary.raw_response = None;
        summary
    }

    async fn complete_with_retry(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let policy = self.config.retry;
        let attempts = policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.backend.complete(req.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let wait = policy.delay_after(attempt);
                    warn!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "Transient LLM error, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Prompt / response helpers ─────────────────────────────────────────────────

/// User prompt for one chunk of a paper.
pub fn build_prompt(chunk: &str, total_chunks: usize) -> String {
    let part = if total_chunks > 1 {
        format!(" (part 1 of {total_chunks})")
    } else {
        String::new()
    };

    format!(
        r#"You are analyzing a research paper. Extract the following information:

1. Title
2. Authors (comma-separated list)
3. Year of publication
4. Abstract/Summary (2-3 sentences)
5. Main research question or objective
6. Methodology (brief description)
7. Key findings (3-5 bullet points)
8. Main conclusions
9. Limitations mentioned
10. Future work suggested
11. Biomarkers discussed, each with the diseases it is associated with

Respond ONLY with a JSON object in this exact format:
{{
  "title": "paper title",
  "authors": "author1, author2, author3",
  "year": "YYYY",
  "abstract": "brief summary",
  "research_question": "main question",
  "methodology": "methods used",
  "key_findings": ["finding 1", "finding 2", "finding 3"],
  "conclusions": "main conclusions",
  "limitations": "limitations mentioned",
  "future_work": "suggested future research",
  "biomarkers": [
    {{
      "name": "biomarker name, e.g. BRCA1",
      "diseases": ["associated disease"],
      "association_type": "diagnostic | prognostic | predictive | therapeutic | risk",
      "evidence_level": "e.g. clinical trial, cohort study, in vitro",
      "evidence": "one sentence from the paper supporting the association"
    }}
  ]
}}

If a field cannot be determined from the text, use "Not found". If no
biomarkers are discussed, use an empty list.

Here is the research paper{part}:

{chunk}"#
    )
}

/// Strip surrounding whitespace and a Markdown code fence, if any.
pub fn clean_json_response(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

pub fn parse_summary(raw: &str) -> Result<PaperSummary, serde_json::Error> {
    serde_json::from_str(clean_json_response(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Provider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records the prompts it saw.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), prompts: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            let user = req.messages.iter().find(|m| m.role == "user").map(|m| m.content.clone());
            self.prompts.lock().unwrap().push(user.unwrap_or_default());
            let next = self.script.lock().unwrap().pop_front().unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".into())));
            next.map(|content| LlmResponse {
                content,
                model: "scripted".into(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str { "scripted" }
        fn provider(&self) -> Provider { Provider::Anthropic }
        fn max_context_tokens(&self) -> usize { 200_000 }
        fn max_output_tokens(&self) -> usize { 8_192 }
    }

    fn fast_config() -> SummariserConfig {
        SummariserConfig {
            retry: RetryPolicy {
                max_retries: 3,
                min_wait: Duration::from_millis(1),
                max_wait: Duration::from_millis(2),
            },
            ..Default::default()
        }
    }

    fn paper() -> Vec<String> {
        vec!["--- Page 1 ---\nBRCA1 mutations in breast cancer.".to_string()]
    }

    #[tokio::test]
    async fn test_successful_summary() {
        let json = paperlens_test_utils::fenced_summary_json("BRCA1 study", "BRCA1", "breast cancer");
        let backend = ScriptedBackend::new(vec![Ok(json)]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());

        let s = summariser.summarise("brca.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::Success);
        assert_eq!(s.filename, "brca.pdf");
        assert_eq!(s.title.as_deref(), Some("BRCA1 study"));
        assert_eq!(s.api_provider.as_deref(), Some("anthropic"));
        assert_eq!(s.chunks_processed, Some(1));
        assert_eq!(s.biomarkers[0].diseases, vec!["breast cancer".to_string()]);
        assert!(!backend.prompts.lock().unwrap()[0].contains("part 1 of"));
    }

    #[tokio::test]
    async fn test_invalid_json_keeps_truncated_raw_response() {
        let garbage = format!("Sure! Here is the summary: {}", "x".repeat(800));
        let summariser = PaperSummariser::new(ScriptedBackend::new(vec![Ok(garbage)]), fast_config());

        let s = summariser.summarise("bad.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::JsonError);
        assert_eq!(s.raw_response.as_ref().map(|r| r.chars().count()), Some(RAW_RESPONSE_KEEP));
        assert!(s.error.is_some());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let json = paperlens_test_utils::fenced_summary_json("t", "KRAS", "pancreatic cancer");
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::ApiError { status: 529, message: "overloaded".into() }),
            Err(LlmError::RateLimitExceeded),
            Ok(json),
        ]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());

        let s = summariser.summarise("kras.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::Success);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_give_up_as_api_error() {
        let backend = ScriptedBackend::new(vec![
            Err(LlmError::RateLimitExceeded),
            Err(LlmError::RateLimitExceeded),
            Err(LlmError::RateLimitExceeded),
            Ok("{}".into()),
        ]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());

        let s = summariser.summarise("p.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::ApiError);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::ApiError { status: 401, message: "bad key".into() })]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());

        let s = summariser.summarise("p.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::ApiError);
        assert_eq!(s.error.as_deref(), Some("API error [401]: bad key"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_never_calls_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());
        let s = summariser.summarise("blank.pdf", &[]).await;
        assert_eq!(s.status, PaperStatus::ExtractionFailed);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_long_paper_prompt_marks_first_part() {
        let json = paperlens_test_utils::fenced_summary_json("t", "EGFR", "NSCLC");
        let backend = ScriptedBackend::new(vec![Ok(json)]);
        let summariser = PaperSummariser::new(backend.clone(), fast_config());

        let chunks = vec![
            "--- Page 1 ---\nEGFR exon 19 deletion.\n\n".to_string(),
            "--- Page 2 ---\nOsimertinib response.".to_string(),
        ];
        let s = summariser.summarise("egfr.pdf", &chunks).await;
        assert_eq!(s.chunks_processed, Some(2));
        let prompt = backend.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("(part 1 of 2)"));
        assert!(prompt.contains("EGFR exon 19"));
        assert!(!prompt.contains("Osimertinib"));
    }

    #[test]
    fn test_null_biomarker_list_still_parses() {
        let s = parse_summary(r#"{"title":"T","biomarkers":null}"#).unwrap();
        assert_eq!(s.title.as_deref(), Some("T"));
        assert!(s.biomarkers.is_empty());
    }

    #[tokio::test]
    async fn test_stray_biomarker_entry_does_not_fail_the_paper() {
        let response = r#"```json
{"title": "TP53 cohort", "biomarkers": ["BRCA1", {"name": "TP53", "diseases": ["sarcoma"]}]}
```"#;
        let summariser = PaperSummariser::new(ScriptedBackend::new(vec![Ok(response.into())]), fast_config());

        let s = summariser.summarise("tp53.pdf", &paper()).await;
        assert_eq!(s.status, PaperStatus::Success);
        let mentions = s.to_extraction().biomarker_mentions;
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[1].raw_name, "TP53");
        assert_eq!(mentions[1].disease, "sarcoma");
    }

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_response("```\n{}\n```"), "{}");
        assert_eq!(clean_json_response("  {}  "), "{}");
    }

    #[test]
    fn test_backoff_is_clamped() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_secs(4));
        assert_eq!(p.delay_after(2), Duration::from_secs(8));
        assert_eq!(p.delay_after(3), Duration::from_secs(10));
        assert_eq!(p.delay_after(30), Duration::from_secs(10));
    }
}
