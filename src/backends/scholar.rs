use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::{BackendError, Delay, RelevanceGate, SearchBackend};
use crate::gemini::TextGenerator;
use crate::model::{KeywordSet, Record};
use crate::parse::scholar_html::is_blocked_page;
use crate::parse::{ResponseParser, ScholarHtmlParser};
use crate::query::{YearRange, build_query};
use crate::sources::{GOOGLE_SCHOLAR, same_source};

const PAGE_SIZE: usize = 10;
const MAX_PAGES: usize = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_PAGE_DELAY: Duration = Duration::from_secs(1);
const MAX_PAGE_DELAY: Duration = Duration::from_secs(3);
const YEAR_WINDOW: i32 = 10;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

pub struct ScholarBackend<G> {
    http: Client,
    base_url: String,
    gate: Option<RelevanceGate<G>>,
    page_delay: Delay,
}

impl<G: TextGenerator> ScholarBackend<G> {
    pub fn new(http: Client, base_url: &str, gate: Option<RelevanceGate<G>>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            gate,
            page_delay: Delay::Between(MIN_PAGE_DELAY, MAX_PAGE_DELAY),
        }
    }

    pub fn with_page_delay(mut self, delay: Delay) -> Self {
        self.page_delay = delay;
        self
    }

    fn page_url(&self, query: &str, page: usize, years: YearRange) -> Result<Url, BackendError> {
        let start = (page * PAGE_SIZE).to_string();
        let year_from = years.from.to_string();
        Ok(Url::parse_with_params(
            &format!("{}/scholar", self.base_url),
            &[
                ("q", query),
                ("hl", "en"),
                ("start", &start),
                ("as_ylo", &year_from),
            ],
        )?)
    }

    async fn fetch_page(&self, url: Url) -> Result<String, BackendError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .header("Accept", ACCEPT_HTML)
            .header("Accept-Language", "en-US,en;q=0.9")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::Blocked);
        }
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if is_blocked_page(&body) {
            return Err(BackendError::Blocked);
        }
        Ok(body)
    }

    async fn scrape(
        &self,
        keywords: &KeywordSet,
        source: &str,
        limit: usize,
    ) -> Result<Vec<Record>, BackendError> {
        let years = YearRange::recent(YEAR_WINDOW);
        let query = build_query(keywords, GOOGLE_SCHOLAR, years);
        let parser = ScholarHtmlParser::new(Url::parse(&self.base_url)?);
        let pages = limit.div_ceil(PAGE_SIZE).min(MAX_PAGES);

        let mut records = Vec::new();
        for page in 0..pages {
            if page > 0 {
                self.page_delay.wait().await;
            }

            let html = match self.fetch_page(self.page_url(&query, page, years)?).await {
                Ok(html) => html,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "Scholar paging stopped, keeping earlier pages");
                    break;
                }
            };

            let page_records = parser.parse(&html, source);
            debug!(page, records = page_records.len(), "Scholar page parsed");
            if page_records.is_empty() {
                break;
            }
            records.extend(page_records);
            if records.len() >= limit {
                break;
            }
        }

        records.truncate(limit);
        Ok(records)
    }
}

impl<G: TextGenerator> SearchBackend for ScholarBackend<G> {
    fn name(&self) -> &'static str {
        "scholar"
    }

    fn supports(&self, source: &str) -> bool {
        same_source(source, GOOGLE_SCHOLAR)
    }

    async fn search(&self, keywords: &KeywordSet, source: &str, limit: usize) -> Vec<Record> {
        if !self.supports(source) || limit == 0 {
            return Vec::new();
        }

        let records = match self.scrape(keywords, source, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %source, error = %e, "Scholar search failed");
                return Vec::new();
            }
        };

        let mut records = match &self.gate {
            Some(gate) => gate.screen(records, keywords).await,
            None => records,
        };
        records.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        info!(source = %source, records = records.len(), "Scholar search complete");
        records
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::gemini::testing::MockGenerator;
    use crate::model::RelevanceOrigin;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result_page(titles: &[&str]) -> String {
        let results: String = titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                format!(
                    "<div class=\"gs_r\"><div class=\"gs_ri\">\
                     <h3 class=\"gs_rt\"><a href=\"https://journal.example/{i}\">{title}</a></h3>\
                     <div class=\"gs_a\">A Author - Kidney Journal, 2022 - journal.example</div>\
                     <div class=\"gs_rs\">Snippet about renal injury.</div></div></div>"
                )
            })
            .collect();
        format!("<html><body>{results}</body></html>")
    }

    fn keywords() -> KeywordSet {
        KeywordSet::from_comma_list("osimertinib, kidney")
    }

    fn backend(server: &MockServer, gate: Option<MockGenerator>) -> ScholarBackend<MockGenerator> {
        ScholarBackend::new(Client::new(), &server.uri(), gate.map(RelevanceGate::new))
            .with_page_delay(Delay::NONE)
    }

    async fn mount_page(server: &MockServer, start: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/scholar"))
            .and(query_param("start", start))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pages_until_limit_with_browser_headers() {
        let server = MockServer::start().await;

        Mock::given(path("/scholar"))
            .and(query_param("start", "0"))
            .and(query_param("hl", "en"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string(result_page(&[
                "Osimertinib and acute kidney injury",
                "EGFR inhibitors and glomerular disease",
            ])))
            .expect(1)
            .mount(&server)
            .await;
        mount_page(
            &server,
            "10",
            result_page(&["Nephrotic syndrome during gefitinib therapy"]),
        )
        .await;

        let records = backend(&server, None).search(&keywords(), "Google Scholar", 15).await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].journal, "Kidney Journal");
        assert_eq!(records[0].source, "Google Scholar");
    }

    #[tokio::test]
    async fn paging_stops_after_three_full_pages() {
        let server = MockServer::start().await;
        for start in ["0", "10", "20"] {
            let titles: Vec<String> = (0..PAGE_SIZE)
                .map(|i| format!("Renal adverse event report {start}-{i}"))
                .collect();
            let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
            mount_page(&server, start, result_page(&titles)).await;
        }
        Mock::given(path("/scholar"))
            .and(query_param("start", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_string(result_page(&[])))
            .expect(0)
            .mount(&server)
            .await;

        let records = backend(&server, None).search(&keywords(), "Google Scholar", 100).await;

        assert_eq!(records.len(), MAX_PAGES * PAGE_SIZE);
    }

    #[tokio::test]
    async fn query_carries_year_floor() {
        let server = MockServer::start().await;
        let floor = YearRange::recent(YEAR_WINDOW).from.to_string();

        Mock::given(path("/scholar"))
            .and(query_param("as_ylo", floor.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(result_page(&[])))
            .expect(1)
            .mount(&server)
            .await;

        let records = backend(&server, None).search(&keywords(), "google scholar", 30).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn rate_limited_first_page_yields_empty() {
        let server = MockServer::start().await;

        Mock::given(path("/scholar"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let records = backend(&server, None).search(&keywords(), "Google Scholar", 30).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn captcha_on_later_page_keeps_earlier_results() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "0",
            result_page(&["Osimertinib and acute kidney injury"]),
        )
        .await;
        mount_page(
            &server,
            "10",
            "<html><div id=\"gs_captcha_ccl\">unusual traffic</div></html>".to_string(),
        )
        .await;

        let records = backend(&server, None).search(&keywords(), "Google Scholar", 30).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn gate_filters_and_sorts_by_assessed_score() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "0",
            result_page(&[
                "Osimertinib and acute kidney injury",
                "Unrelated cardiology trial outcomes",
                "EGFR inhibitors and glomerular disease",
            ]),
        )
        .await;

        let gate = MockGenerator::replying(&[
            "RELEVANT: YES\nSCORE: 60",
            "RELEVANT: NO\nSCORE: 5",
            "RELEVANT: YES\nSCORE: 95",
        ]);
        let records = backend(&server, Some(gate))
            .search(&keywords(), "Google Scholar", 10)
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "EGFR inhibitors and glomerular disease");
        assert_eq!(records[0].relevance, 0.95);
        assert_eq!(records[0].relevance_origin, RelevanceOrigin::Assessed);
        assert_eq!(records[1].relevance, 0.6);
    }

    #[tokio::test]
    async fn unsupported_source_is_empty() {
        let server = MockServer::start().await;
        Mock::given(path("/scholar"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let records = backend(&server, None).search(&keywords(), "PubMed", 10).await;
        assert!(records.is_empty());
    }
}
