use std::time::Duration;

use tracing::{info, warn};

use super::SearchBackend;
use crate::gemini::{GenerateParams, TextGenerator};
use crate::model::{KeywordSet, Record};
use crate::parse::{DelimitedParser, ResponseParser};
use crate::query::YearRange;
use crate::sources::{ACADEMIC_SEARCH, GOOGLE_SCHOLAR, PUBMED, same_source};

const SUPPORTED: &[&str] = &[PUBMED, GOOGLE_SCHOLAR, ACADEMIC_SEARCH];
const RECENCY_YEARS: i32 = 3;
const PUBMED_MAX_PAPERS: usize = 20;
const OTHER_MAX_PAPERS: usize = 15;

const RECORD_FORMAT: &str = "PAPER_START
Title: [exact paper title]
Authors: [author1, author2, author3]
Journal: [journal name]
Year: [publication year]
PMID: [PubMed ID if available]
DOI: [DOI if available]
URL: [direct link]
Abstract: [brief abstract or summary]
Type: [case_report/clinical_study/systematic_review/meta_analysis/other]
PAPER_END";

fn search_params() -> GenerateParams {
    GenerateParams {
        temperature: Some(0.1),
        max_output_tokens: Some(4000),
        timeout: Duration::from_secs(60),
        grounded: true,
    }
}

/// Prompt for `source` asking for at most `limit` papers from `years`.
pub fn search_prompt(keywords: &KeywordSet, source: &str, limit: usize, years: YearRange) -> String {
    let topic = keywords.joined();
    let (from, to) = (years.from, years.to);

    if same_source(source, PUBMED) {
        let count = limit.min(PUBMED_MAX_PAPERS);
        format!(
            "Search PubMed and medical databases for research papers about: {topic}

Requirements:
- Focus on papers from {from}-{to} (recent {RECENCY_YEARS} years)
- Find exactly {count} most relevant papers
- Include case reports, clinical studies, systematic reviews
- Prioritize papers with EGFR inhibitor nephrotoxicity focus

For each paper, provide this EXACT format:
{RECORD_FORMAT}

Search now and provide real, current papers in the exact format above."
        )
    } else if same_source(source, GOOGLE_SCHOLAR) {
        let count = limit.min(OTHER_MAX_PAPERS);
        format!(
            "Search Google Scholar for academic papers about: {topic}

Requirements:
- Recent papers ({from}-{to})
- Find exactly {count} most relevant papers
- Focus on peer-reviewed medical literature
- Include nephrology and oncology journals

For each paper, provide this EXACT format:
{RECORD_FORMAT}

Search now and provide real papers in the exact format above."
        )
    } else {
        let count = limit.min(OTHER_MAX_PAPERS);
        format!(
            "Search academic databases for papers about: {topic}

Find {count} most relevant recent papers ({from}-{to}) and provide them in this EXACT format:

{RECORD_FORMAT}

Search now and provide real papers."
        )
    }
}

pub struct GeminiSearchBackend<G> {
    client: G,
}

impl<G: TextGenerator> GeminiSearchBackend<G> {
    pub fn new(client: G) -> Self {
        Self { client }
    }
}

impl<G: TextGenerator> SearchBackend for GeminiSearchBackend<G> {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn supports(&self, source: &str) -> bool {
        SUPPORTED.iter().any(|s| same_source(s, source))
    }

    async fn search(&self, keywords: &KeywordSet, source: &str, limit: usize) -> Vec<Record> {
        if !self.supports(source) || limit == 0 {
            return Vec::new();
        }

        let prompt = search_prompt(keywords, source, limit, YearRange::recent(RECENCY_YEARS));
        let reply = match self.client.generate(&prompt, &search_params()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(source = %source, error = %e, "Gemini search failed");
                return Vec::new();
            }
        };

        let mut records = DelimitedParser.parse(&reply, source);
        records.truncate(limit);
        info!(
            source = %source,
            reply_chars = reply.len(),
            records = records.len(),
            "Gemini search complete"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use crate::gemini::testing::MockGenerator;
    use crate::parse::delimited::PROVISIONAL_RELEVANCE;

    const YEARS: YearRange = YearRange {
        from: 2021,
        to: 2024,
    };

    fn keywords() -> KeywordSet {
        KeywordSet::from_comma_list("osimertinib, glomerulonephritis")
    }

    fn paper_block(n: usize) -> String {
        format!(
            "PAPER_START\nTitle: Osimertinib renal case series number {n}\nAuthors: A Author\n\
             Journal: Kidney Journal\nYear: 2023\nPMID: {}\nType: case_report\nPAPER_END\n",
            4000 + n
        )
    }

    #[test]
    fn pubmed_prompt_caps_at_twenty() {
        let prompt = search_prompt(&keywords(), "PubMed", 50, YEARS);
        assert!(prompt.contains("osimertinib, glomerulonephritis"));
        assert!(prompt.contains("Find exactly 20 most relevant papers"));
        assert!(prompt.contains("2021-2024"));
        assert!(prompt.contains("PAPER_START"));
    }

    #[test]
    fn scholar_and_generic_prompts_cap_at_fifteen() {
        let scholar = search_prompt(&keywords(), "google scholar", 50, YEARS);
        assert!(scholar.starts_with("Search Google Scholar"));
        assert!(scholar.contains("Find exactly 15"));

        let generic = search_prompt(&keywords(), "Academic Search", 7, YEARS);
        assert!(generic.starts_with("Search academic databases"));
        assert!(generic.contains("Find 7 most relevant"));
    }

    #[test]
    fn supports_three_sources() {
        let backend = GeminiSearchBackend::new(MockGenerator::default());
        assert!(backend.supports("pubmed"));
        assert!(backend.supports("Google Scholar"));
        assert!(backend.supports("academic search"));
        assert!(!backend.supports("Embase"));
    }

    #[tokio::test]
    async fn parses_reply_with_search_params() {
        let reply = format!("Here you go:\n{}{}", paper_block(1), paper_block(2));
        let mock = MockGenerator::replying(&[&reply]);
        let backend = GeminiSearchBackend::new(mock.clone());

        let records = backend.search(&keywords(), "PubMed", 10).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pmid.as_deref(), Some("4001"));
        assert_eq!(records[0].relevance, PROVISIONAL_RELEVANCE);
        assert_eq!(records[1].source, "PubMed");

        let params = &mock.params()[0];
        assert_eq!(params.temperature, Some(0.1));
        assert_eq!(params.max_output_tokens, Some(4000));
        assert_eq!(params.timeout, Duration::from_secs(60));
        assert!(params.grounded);
    }

    #[tokio::test]
    async fn truncates_to_limit() {
        let reply: String = (0..5).map(paper_block).collect();
        let backend = GeminiSearchBackend::new(MockGenerator::replying(&[&reply]));

        let records = backend.search(&keywords(), "Google Scholar", 3).await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn llm_failure_yields_empty() {
        let mock = MockGenerator::with_replies([Err(GeminiError::QuotaExhausted("daily".into()))]);
        let backend = GeminiSearchBackend::new(mock);
        assert!(backend.search(&keywords(), "PubMed", 10).await.is_empty());
    }

    #[tokio::test]
    async fn unsupported_source_makes_no_call() {
        let mock = MockGenerator::default();
        let backend = GeminiSearchBackend::new(mock.clone());
        assert!(backend.search(&keywords(), "Embase", 10).await.is_empty());
        assert!(mock.prompts().is_empty());
    }
}
