//! Raw payload to `Record` conversion, one parser per backend family.
//!
//! Parsers are pure and total: malformed input yields fewer records, never
//! an error. The only records dropped are those failing the title check or
//! missing their essential anchors.

pub mod delimited;
pub mod eutils;
pub mod scholar_html;

use crate::model::Record;

pub use delimited::DelimitedParser;
pub use eutils::ESummaryParser;
pub use scholar_html::ScholarHtmlParser;

pub trait ResponseParser {
    fn parse(&self, raw: &str, source: &str) -> Vec<Record>;
}

/// Removes placeholder brackets such as `[journal name]`.
pub(crate) fn strip_brackets(value: &str) -> String {
    value.replace(['[', ']'], "").trim().to_string()
}

/// Canonical PubMed article URL for a PMID.
pub(crate) fn pubmed_url(pmid: &str) -> String {
    format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
}

pub(crate) fn has_web_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
