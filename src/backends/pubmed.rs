use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::{BackendError, Delay, SearchBackend};
use crate::config::ApiKey;
use crate::model::{KeywordSet, Record};
use crate::parse::eutils::parse_id_list;
use crate::parse::{ESummaryParser, ResponseParser};
use crate::query::{YearRange, build_query};
use crate::sources::{PUBMED, same_source};

const BATCH_SIZE: usize = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BATCH_DELAY: Duration = Duration::from_millis(500);
const DATE_WINDOW_YEARS: i32 = 10;
const TOOL_NAME: &str = "litscout";

pub struct PubMedBackend {
    http: Client,
    base_url: String,
    api_key: Option<ApiKey>,
    batch_delay: Delay,
}

impl PubMedBackend {
    pub fn new(http: Client, base_url: &str, api_key: Option<ApiKey>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            batch_delay: Delay::Fixed(BATCH_DELAY),
        }
    }

    pub fn with_batch_delay(mut self, delay: Delay) -> Self {
        self.batch_delay = delay;
        self
    }

    fn endpoint(&self, utility: &str, params: &[(&str, &str)]) -> Result<Url, BackendError> {
        let mut pairs: Vec<(&str, &str)> = vec![("db", "pubmed"), ("retmode", "xml")];
        pairs.extend_from_slice(params);
        pairs.push(("tool", TOOL_NAME));
        if let Some(key) = &self.api_key {
            pairs.push(("api_key", key.expose()));
        }
        Ok(Url::parse_with_params(
            &format!("{}/{utility}.fcgi", self.base_url),
            &pairs,
        )?)
    }

    async fn get_text(&self, url: Url) -> Result<String, BackendError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn esearch(&self, term: &str, limit: usize) -> Result<Vec<String>, BackendError> {
        let retmax = limit.to_string();
        let url = self.endpoint(
            "esearch",
            &[("term", term), ("retmax", &retmax), ("sort", "relevance")],
        )?;
        let body = self.get_text(url).await?;
        let mut ids = parse_id_list(&body)?;
        ids.truncate(limit);
        Ok(ids)
    }

    async fn esummary(&self, ids: &[String], source: &str) -> Result<Vec<Record>, BackendError> {
        let joined = ids.join(",");
        let url = self.endpoint("esummary", &[("id", &joined), ("version", "2.0")])?;
        let body = self.get_text(url).await?;
        Ok(ESummaryParser.parse(&body, source))
    }

    async fn try_search(
        &self,
        keywords: &KeywordSet,
        source: &str,
        limit: usize,
    ) -> Result<Vec<Record>, BackendError> {
        let term = build_query(keywords, PUBMED, YearRange::recent(DATE_WINDOW_YEARS));
        debug!(term = %term, "PubMed ESearch");

        let ids = self.esearch(&term, limit).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        for (index, batch) in ids.chunks(BATCH_SIZE).enumerate() {
            if index > 0 {
                self.batch_delay.wait().await;
            }
            match self.esummary(batch, source).await {
                Ok(batch_records) => records.extend(batch_records),
                Err(e) => warn!(
                    batch = index,
                    ids = batch.len(),
                    error = %e,
                    "PubMed summary batch failed, skipping"
                ),
            }
        }
        Ok(records)
    }
}

impl SearchBackend for PubMedBackend {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    fn supports(&self, source: &str) -> bool {
        same_source(source, PUBMED)
    }

    async fn search(&self, keywords: &KeywordSet, source: &str, limit: usize) -> Vec<Record> {
        if !self.supports(source) || limit == 0 {
            return Vec::new();
        }
        match self.try_search(keywords, source, limit).await {
            Ok(records) => {
                info!(source = %source, records = records.len(), "PubMed search complete");
                records
            }
            Err(e) => {
                warn!(source = %source, error = %e, "PubMed search failed");
                Vec::new()
            }
        }
    }
}
