//! Search backends, one per protocol family.
//!
//! Every backend answers `search(keywords, source, limit)`. A backend that
//! does not serve `source` returns nothing, so the pipeline can broadcast a
//! request to all of them. Transport and payload failures are logged and
//! also yield an empty list; only the pipeline decides what an empty source
//! means.

pub mod gemini_search;
pub mod pubmed;
pub mod relevance_gate;
pub mod scholar;

use std::time::Duration;

use crate::gemini::TextGenerator;
use crate::model::{KeywordSet, Record};

pub use gemini_search::GeminiSearchBackend;
pub use pubmed::PubMedBackend;
pub use relevance_gate::RelevanceGate;
pub use scholar::ScholarBackend;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked by the search engine (CAPTCHA or rate limit)")]
    Blocked,
}

pub trait SearchBackend {
    fn name(&self) -> &'static str;

    fn supports(&self, source: &str) -> bool;

    /// Records for `source`, at most `limit`. Never fails.
    async fn search(&self, keywords: &KeywordSet, source: &str, limit: usize) -> Vec<Record>;
}

/// Wait inserted between consecutive requests to the same host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Fixed(Duration),
    /// Uniformly random in `[min, max]`.
    Between(Duration, Duration),
}

impl Delay {
    pub const NONE: Delay = Delay::Fixed(Duration::ZERO);

    fn pick(self) -> Duration {
        match self {
            Delay::Fixed(d) => d,
            Delay::Between(min, max) if max > min => {
                let lo = min.as_millis() as u64;
                let hi = max.as_millis() as u64;
                Duration::from_millis(fastrand::u64(lo..=hi))
            }
            Delay::Between(min, _) => min,
        }
    }

    pub async fn wait(self) {
        let delay = self.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// The configured backends, held by value so the pipeline can fan out
/// over a single `Vec`.
pub enum Backend<G> {
    PubMed(PubMedBackend),
    Gemini(GeminiSearchBackend<G>),
    Scholar(ScholarBackend<G>),
}

impl<G: TextGenerator> SearchBackend for Backend<G> {
    fn name(&self) -> &'static str {
        match self {
            Backend::PubMed(b) => b.name(),
            Backend::Gemini(b) => b.name(),
            Backend::Scholar(b) => b.name(),
        }
    }

    fn supports(&self, source: &str) -> bool {
        match self {
            Backend::PubMed(b) => b.supports(source),
            Backend::Gemini(b) => b.supports(source),
            Backend::Scholar(b) => b.supports(source),
        }
    }

    async fn search(&self, keywords: &KeywordSet, source: &str, limit: usize) -> Vec<Record> {
        match self {
            Backend::PubMed(b) => b.search(keywords, source, limit).await,
            Backend::Gemini(b) => b.search(keywords, source, limit).await,
            Backend::Scholar(b) => b.search(keywords, source, limit).await,
        }
    }
}
