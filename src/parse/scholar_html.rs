use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{ResponseParser, has_web_scheme, pubmed_url};
use crate::model::{MAX_AUTHORS, Record, RecordDraft, collapse_whitespace};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("scholar selector is valid")
}

static RESULT: LazyLock<Selector> = LazyLock::new(|| selector("div.gs_ri"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h3, h2, h4"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| selector("div.gs_rs, p"));
static CITATION: LazyLock<Selector> = LazyLock::new(|| selector("div.gs_a"));

static FORMAT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[A-Z]+\]").expect("format tag regex is valid")
});

static FULL_NAME_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+(?:, [A-Z][a-z]+ [A-Z][a-z]+)+")
        .expect("full name regex is valid")
});

static INITIAL_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]\. ?[A-Z][a-z]+(?:, ?[A-Z]\. ?[A-Z][a-z]+)*")
        .expect("initial name regex is valid")
});

static YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(20[0-2][0-9])\b").expect("year regex is valid")
});

static DOI_IN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"10\.\d{4,9}/[^\s?#&]+").expect("doi regex is valid")
});

static PUBMED_ID_IN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pubmed\.ncbi\.nlm\.nih\.gov/(\d+)").expect("pubmed url regex is valid")
});

/// True when Scholar served an anti-bot interstitial instead of results.
pub fn is_blocked_page(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("gs_captcha")
        || lower.contains("unusual traffic")
        || lower.contains("id=\"recaptcha\"")
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn first_text(container: ElementRef<'_>, sel: &Selector) -> Option<String> {
    container
        .select(sel)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Authors named in snippet text: a comma list of full names, then a list
/// of initial-plus-surname names.
pub fn authors_from_text(text: &str) -> Vec<String> {
    let found = FULL_NAME_LIST
        .find(text)
        .or_else(|| INITIAL_LIST.find(text));
    found
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn year_from(text: &str) -> Option<String> {
    YEAR.captures(text).map(|caps| caps[1].to_string())
}

/// Venue from a citation line such as
/// `J Smith, K Lee - Clinical Kidney Journal, 2021 - academic.oup.com`.
fn venue_from_citation(line: &str) -> Option<String> {
    let segments: Vec<&str> = line.split(" - ").map(str::trim).collect();
    let venue = segments.get(1).map(|segment| {
        let without_year = YEAR.replace_all(segment, "");
        without_year
            .trim()
            .trim_end_matches(',')
            .trim()
            .trim_start_matches('…')
            .trim()
            .to_string()
    });
    venue
        .filter(|v| !v.is_empty())
        .or_else(|| segments.get(2).map(|host| host.to_string()))
        .filter(|v| !v.is_empty())
}

/// Scholar HTML parser. Relative links resolve against `base`.
#[derive(Debug, Clone)]
pub struct ScholarHtmlParser {
    base: Url,
}

impl ScholarHtmlParser {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    fn resolve_link(
        &self,
        container: ElementRef<'_>,
        heading: Option<ElementRef<'_>>,
    ) -> Option<String> {
        let anchor = heading
            .and_then(|h| h.select(&LINK).next())
            .or_else(|| container.select(&LINK).next())?;
        let href = anchor.value().attr("href")?;
        let url = self.base.join(href).ok()?;
        let url = url.to_string();
        has_web_scheme(&url).then_some(url)
    }

    fn search_url_for(&self, title: &str) -> String {
        let mut url = self.base.clone();
        url.set_path("/scholar");
        url.query_pairs_mut().clear().append_pair("q", title);
        url.to_string()
    }

    fn parse_result(&self, container: ElementRef<'_>, source: &str) -> Option<Record> {
        let heading = container.select(&HEADING).next();
        let title = heading
            .map(text_of)
            .map(|t| collapse_whitespace(&FORMAT_TAG.replace_all(&t, "")))
            .filter(|t| !t.is_empty());
        let link = self.resolve_link(container, heading);

        let Some(title) = title else {
            debug!(link = ?link, "dropping scholar result without title");
            return None;
        };

        let snippet = first_text(container, &SNIPPET).unwrap_or_default();
        let citation = first_text(container, &CITATION).unwrap_or_default();

        let url = link.unwrap_or_else(|| self.search_url_for(&title));
        let doi = DOI_IN_URL.find(&url).map(|m| m.as_str().to_string());
        let pmid = PUBMED_ID_IN_URL
            .captures(&url)
            .map(|caps| caps[1].to_string());
        let url = match &pmid {
            Some(pmid) => pubmed_url(pmid),
            None => url,
        };

        RecordDraft {
            title,
            authors: authors_from_text(&snippet),
            journal: venue_from_citation(&citation),
            publication_date: year_from(&snippet).or_else(|| year_from(&citation)),
            doi,
            pmid,
            url,
            abstract_text: snippet,
            ..RecordDraft::default()
        }
        .finish(source, MAX_AUTHORS)
    }
}

impl ResponseParser for ScholarHtmlParser {
    fn parse(&self, raw: &str, source: &str) -> Vec<Record> {
        let document = Html::parse_document(raw);
        document
            .select(&RESULT)
            .filter_map(|container| self.parse_result(container, source))
            .collect()
    }
}
