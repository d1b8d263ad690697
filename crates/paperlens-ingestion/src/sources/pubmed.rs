//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! NCBI allows 3 requests/s without an API key and 10 with one.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::LiteratureSource;
use crate::models::{DateWindow, PaperMetadata};

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PMIDs per efetch request.
const EFETCH_BATCH: usize = 200;

const PAUSE_WITHOUT_KEY: Duration = Duration::from_millis(340);
const PAUSE_WITH_KEY:    Duration = Duration::from_millis(100);

pub struct PubMedClient {
    client: Client,
    base_url: String,
    email: String,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(email: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            email: email.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Point at a mirror or a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pause between consecutive requests.
    pub fn rate_limit(&self) -> Duration {
        if self.api_key.is_some() { PAUSE_WITH_KEY } else { PAUSE_WITHOUT_KEY }
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("email", self.email.clone()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    #[instrument(skip(self))]
    async fn esearch(
        &self,
        query: &str,
        max: usize,
        window: Option<DateWindow>,
    ) -> anyhow::Result<Vec<String>> {
        let mut params = self.base_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", max.to_string()));
        params.push(("retmode", "json".to_string()));
        if let Some(w) = window {
            let (min, max) = w.format_bounds();
            params.push(("datetype", "pdat".to_string()));
            params.push(("mindate", min));
            params.push(("maxdate", max));
        }

        let resp: serde_json::Value = self.client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await?
            .error_for_status()
            .context("PubMed esearch failed")?
            .json()
            .await?;

        let ids: Vec<String> = resp["esearchresult"]["idlist"]
            .as_array()
            .map(|list| list.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        debug!(count = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch one batch of PMIDs as XML.
    #[instrument(skip(self, pmids), fields(batch = pmids.len()))]
    async fn efetch_batch(&self, pmids: &[String]) -> anyhow::Result<Vec<PaperMetadata>> {
        let mut params = self.base_params();
        params.push(("id", pmids.join(",")));
        params.push(("retmode", "xml".to_string()));

        let xml = self.client
            .get(format!("{}/efetch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await?
            .error_for_status()
            .context("PubMed efetch failed")?
            .text()
            .await?;

        Ok(parse_pubmed_xml(&xml))
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn search_ids(
        &self,
        query: &str,
        max_results: usize,
        window: Option<DateWindow>,
    ) -> anyhow::Result<Vec<String>> {
        self.esearch(query, max_results, window).await
    }

    /// Batches that fail are logged and skipped.
    async fn fetch_details(&self, ids: &[String]) -> anyhow::Result<Vec<PaperMetadata>> {
        let mut papers = Vec::new();
        for batch in ids.chunks(EFETCH_BATCH) {
            tokio::time::sleep(self.rate_limit()).await;
            match self.efetch_batch(batch).await {
                Ok(mut parsed) => papers.append(&mut parsed),
                Err(e) => warn!(error = %e, batch = batch.len(), "PubMed efetch batch failed"),
            }
        }
        Ok(papers)
    }
}

/// Parse efetch XML (`<PubmedArticleSet><PubmedArticle>…`) into metadata.
/// Articles without a PMID are dropped; a missing title becomes "Unknown".
pub fn parse_pubmed_xml(xml: &str) -> Vec<PaperMetadata> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine over the elements we care about
    let mut current: Option<PaperMetadata> = None;
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut in_citation_pmid = false;
    let mut seen_pmid        = false;
    let mut in_title         = false;
    let mut in_abstract      = false;
    let mut in_last_name     = false;
    let mut in_fore_name     = false;
    let mut in_journal       = false;
    let mut in_journal_title = false;
    let mut in_pub_date      = false;
    let mut in_year          = false;
    let mut current_last     = String::new();
    let mut current_fore     = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(PaperMetadata::default());
                    abstract_parts.clear();
                    seen_pmid = false;
                }
                // Only the first PMID belongs to the article; later ones are
                // in comment/correction references.
                b"PMID" if !seen_pmid => in_citation_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Author"       => { current_last.clear(); current_fore.clear(); }
                b"LastName"     => in_last_name = true,
                b"ForeName"     => in_fore_name = true,
                b"Journal"      => in_journal = true,
                b"Title" if in_journal => in_journal_title = true,
                b"PubDate"      => in_pub_date = true,
                b"Year" if in_pub_date => in_year = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut p) = current {
                    if in_citation_pmid { p.pmid = text.clone(); }
                    if in_title         { append_spaced(&mut p.title, &text); }
                    if in_abstract      { abstract_parts.push(text.clone()); }
                    if in_last_name     { current_last = text.clone(); }
                    if in_fore_name     { current_fore = text.clone(); }
                    if in_journal_title { p.journal = Some(text.clone()); }
                    if in_year          { p.year = Some(text.clone()); }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => {
                    if in_citation_pmid {
                        seen_pmid = true;
                    }
                    in_citation_pmid = false;
                }
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"LastName"     => in_last_name = false,
                b"ForeName"     => in_fore_name = false,
                b"Journal"      => in_journal = false,
                b"Title"        => in_journal_title = false,
                b"PubDate"      => in_pub_date = false,
                b"Year"         => in_year = false,
                b"Author" => {
                    if let Some(ref mut p) = current {
                        if !current_last.is_empty() {
                            let name = if current_fore.is_empty() {
                                current_last.clone()
                            } else {
                                format!("{current_fore} {current_last}")
                            };
                            p.authors.push(name);
                        }
                    }
                }
                b"PubmedArticle" => {
                    if let Some(mut p) = current.take() {
                        if p.pmid.is_empty() {
                            warn!("Skipping PubMed article without PMID");
                        } else {
                            if p.title.is_empty() {
                                p.title = "Unknown".to_string();
                            }
                            if !abstract_parts.is_empty() {
                                p.abstract_text = Some(abstract_parts.join(" "));
                            }
                            p.url = PaperMetadata::pubmed_url(&p.pmid);
                            papers.push(p);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    papers
}

fn append_spaced(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}
