use serde::Serialize;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_JOURNAL: &str = "Unknown Journal";
pub const UNKNOWN_DATE: &str = "Unknown";
pub const MIN_TITLE_CHARS: usize = 10;
pub const MAX_ABSTRACT_CHARS: usize = 500;
pub const MAX_AUTHORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteratureType {
    CaseReport,
    ClinicalStudy,
    SystematicReview,
    MetaAnalysis,
    #[default]
    Other,
}

impl LiteratureType {
    pub const ALL: [LiteratureType; 5] = [
        LiteratureType::CaseReport,
        LiteratureType::ClinicalStudy,
        LiteratureType::SystematicReview,
        LiteratureType::MetaAnalysis,
        LiteratureType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LiteratureType::CaseReport => "case report",
            LiteratureType::ClinicalStudy => "clinical study",
            LiteratureType::SystematicReview => "systematic review",
            LiteratureType::MetaAnalysis => "meta-analysis",
            LiteratureType::Other => "other",
        }
    }
}

impl std::fmt::Display for LiteratureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Who set `Record::relevance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceOrigin {
    /// Placeholder from the parser, replaced by the scorer.
    Provisional,
    /// Judged by the relevance gate; the scorer leaves it alone.
    Assessed,
    /// Final keyword-overlap score.
    Scored,
}

/// One literature item, regardless of which source produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub title: String,
    pub authors: Vec<String>,
    pub journal: String,
    pub publication_date: String,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub url: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub literature_type: LiteratureType,
    pub relevance: f32,
    pub relevance_origin: RelevanceOrigin,
    /// Source name the record was found under (e.g. "PubMed").
    pub source: String,
}

/// Parser-side builder. `finish` applies the record defaults and the
/// minimum-viability check in one place.
#[derive(Debug, Default, Clone)]
pub struct RecordDraft {
    pub title: String,
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub url: String,
    pub abstract_text: String,
    pub literature_type: LiteratureType,
    pub relevance: f32,
}

impl RecordDraft {
    /// Returns `None` when the title is shorter than `MIN_TITLE_CHARS`.
    pub fn finish(self, source: &str, max_authors: usize) -> Option<Record> {
        let title = collapse_whitespace(&self.title);
        if title.chars().count() < MIN_TITLE_CHARS {
            return None;
        }

        let mut authors: Vec<String> = self
            .authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .take(max_authors)
            .map(str::to_string)
            .collect();
        if authors.is_empty() {
            authors.push(UNKNOWN_AUTHOR.to_string());
        }

        Some(Record {
            title,
            authors,
            journal: non_empty(self.journal).unwrap_or_else(|| UNKNOWN_JOURNAL.to_string()),
            publication_date: non_empty(self.publication_date)
                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            doi: non_empty(self.doi),
            pmid: non_empty(self.pmid),
            url: self.url.trim().to_string(),
            abstract_text: truncate_chars(self.abstract_text.trim(), MAX_ABSTRACT_CHARS),
            literature_type: self.literature_type,
            relevance: self.relevance.clamp(0.0, 1.0),
            relevance_origin: RelevanceOrigin::Provisional,
            source: source.to_string(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, case-insensitively de-duplicated keywords. Order is confidence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn push(&mut self, keyword: &str) {
        let keyword = collapse_whitespace(keyword);
        if keyword.is_empty() {
            return;
        }
        let lower = keyword.to_lowercase();
        if !self.0.iter().any(|k| k.to_lowercase() == lower) {
            self.0.push(keyword);
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> String {
        self.0.join(", ")
    }

    /// Parses a comma-separated list, e.g. an LLM reply or a CLI flag.
    pub fn from_comma_list(text: &str) -> Self {
        text.split([',', '\n']).collect()
    }
}

impl<'a> FromIterator<&'a str> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = KeywordSet::default();
        for keyword in iter {
            set.push(keyword);
        }
        set
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("keyword list must contain at least one keyword")]
    EmptyKeywords,

    #[error("source list must contain at least one source")]
    EmptySources,
}

/// Question, keywords and sources for one request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryContext {
    question: String,
    keywords: KeywordSet,
    sources: Vec<String>,
    language: String,
}

impl QueryContext {
    pub fn new(
        question: &str,
        keywords: KeywordSet,
        sources: Vec<String>,
        language: &str,
    ) -> Result<Self, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        if keywords.is_empty() {
            return Err(QueryError::EmptyKeywords);
        }
        let sources = dedup_sources(sources);
        if sources.is_empty() {
            return Err(QueryError::EmptySources);
        }
        let language = match language.trim() {
            "" => "en".to_string(),
            lang => lang.to_ascii_lowercase(),
        };
        Ok(Self {
            question: question.to_string(),
            keywords,
            sources,
            language,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

fn dedup_sources(sources: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(sources.len());
    for source in sources {
        let source = collapse_whitespace(&source);
        if !source.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(&source)) {
            out.push(source);
        }
    }
    out
}

/// Splits a comma-separated source list.
pub fn parse_source_list(text: &str) -> Vec<String> {
    dedup_sources(text.split([',', '\n']).map(str::to_string).collect())
}
