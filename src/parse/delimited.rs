use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{ResponseParser, has_web_scheme, pubmed_url, strip_brackets};
use crate::model::{LiteratureType, MAX_AUTHORS, Record, RecordDraft};

/// Relevance assigned to search-backend records until the scorer runs.
pub const PROVISIONAL_RELEVANCE: f32 = 0.8;

/// Fallback chunks at or below this many characters are noise.
const MIN_CHUNK_CHARS: usize = 100;

static PAPER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)PAPER_START(.*?)PAPER_END").expect("paper block regex is valid")
});

static FIELD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t>*\-•\d.)]*(title|authors?|journal|year|pmid|doi|url|abstract|type)[ \t]*\**[ \t]*:[ \t]*\**",
    )
    .expect("field label regex is valid")
});

static TITLE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t>*\-•\d.)]*title[ \t]*\**[ \t]*:").expect("title label regex is valid")
});

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+[.)][ \t]+").expect("numbered item regex is valid")
});

const PLACEHOLDERS: &[&str] = &["n/a", "na", "none", "null", "not available", "unknown", "-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Title,
    Authors,
    Journal,
    Year,
    Pmid,
    Doi,
    Url,
    Abstract,
    Type,
}

impl Field {
    fn from_label(label: &str) -> Option<Self> {
        Some(match label.to_ascii_lowercase().as_str() {
            "title" => Field::Title,
            "author" | "authors" => Field::Authors,
            "journal" => Field::Journal,
            "year" => Field::Year,
            "pmid" => Field::Pmid,
            "doi" => Field::Doi,
            "url" => Field::Url,
            "abstract" => Field::Abstract,
            "type" => Field::Type,
            _ => return None,
        })
    }
}

/// Label -> value, each value running to the next label. First label wins.
fn extract_fields(block: &str) -> HashMap<Field, &str> {
    let labels: Vec<(usize, usize, Field)> = FIELD_LABEL
        .captures_iter(block)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let field = Field::from_label(caps.get(1)?.as_str())?;
            Some((whole.start(), whole.end(), field))
        })
        .collect();

    let mut fields = HashMap::new();
    for (i, &(_, value_start, field)) in labels.iter().enumerate() {
        let value_end = labels.get(i + 1).map_or(block.len(), |&(start, _, _)| start);
        let value = block[value_start..value_end].trim().trim_matches('*').trim();
        fields.entry(field).or_insert(value);
    }
    fields
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    lower.is_empty() || PLACEHOLDERS.contains(&lower.as_str()) || lower.contains("if available")
}

fn clean_pmid(raw: &str) -> Option<String> {
    let value = strip_brackets(raw);
    (!value.is_empty() && value.chars().all(|c| c.is_ascii_digit())).then_some(value)
}

fn clean_doi(raw: &str) -> Option<String> {
    let value = strip_brackets(raw);
    if is_placeholder(&value) {
        return None;
    }
    let value = value
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("doi:")
        .trim_start_matches("DOI:")
        .trim();
    value.starts_with("10.").then(|| value.to_string())
}

/// Explicit URL when it carries a web scheme, else one derived from an
/// identifier, else empty.
fn resolve_url(raw: Option<&str>, pmid: Option<&str>, doi: Option<&str>) -> String {
    if let Some(raw) = raw {
        let value = strip_brackets(raw);
        if has_web_scheme(&value) {
            return value;
        }
    }
    match (pmid, doi) {
        (Some(pmid), _) => pubmed_url(pmid),
        (None, Some(doi)) => format!("https://doi.org/{doi}"),
        (None, None) => String::new(),
    }
}

/// Maps free-text type labels onto the closed type set.
pub fn map_literature_type(text: &str) -> LiteratureType {
    let lower = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["case_report", "case report"]) {
        LiteratureType::CaseReport
    } else if has(&["systematic_review", "systematic review"]) {
        LiteratureType::SystematicReview
    } else if has(&["meta_analysis", "meta-analysis", "meta analysis"]) {
        LiteratureType::MetaAnalysis
    } else if has(&["clinical_study", "clinical study", "clinical trial"]) {
        LiteratureType::ClinicalStudy
    } else {
        LiteratureType::Other
    }
}

fn parse_block(block: &str, source: &str) -> Option<Record> {
    let fields = extract_fields(block);
    let get = |field: Field| fields.get(&field).copied();

    let pmid = get(Field::Pmid).and_then(clean_pmid);
    let doi = get(Field::Doi).and_then(clean_doi);
    let url = resolve_url(get(Field::Url), pmid.as_deref(), doi.as_deref());

    let clean = |field: Field| {
        get(field)
            .map(strip_brackets)
            .filter(|v| !is_placeholder(v))
    };

    let authors = clean(Field::Authors)
        .map(|list| list.split(',').map(|a| a.trim().to_string()).collect())
        .unwrap_or_default();

    RecordDraft {
        title: get(Field::Title).map(strip_brackets).unwrap_or_default(),
        authors,
        journal: clean(Field::Journal),
        publication_date: clean(Field::Year),
        doi,
        pmid,
        url,
        abstract_text: get(Field::Abstract).unwrap_or_default().to_string(),
        literature_type: get(Field::Type).map_or(LiteratureType::Other, map_literature_type),
        relevance: PROVISIONAL_RELEVANCE,
    }
    .finish(source, MAX_AUTHORS)
}

fn split_at_starts<'a>(text: &'a str, starts: &[usize]) -> Vec<&'a str> {
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Recovery path for replies that ignored the sentinels.
fn fallback_chunks(text: &str) -> Vec<&str> {
    let title_starts: Vec<usize> = TITLE_LABEL.find_iter(text).map(|m| m.start()).collect();
    let chunks = if title_starts.len() > 1 {
        split_at_starts(text, &title_starts)
    } else {
        let numbered: Vec<usize> = NUMBERED_ITEM.find_iter(text).map(|m| m.start()).collect();
        if numbered.len() > 1 {
            split_at_starts(text, &numbered)
        } else {
            vec![text]
        }
    };
    chunks
        .into_iter()
        .filter(|chunk| chunk.trim().chars().count() > MIN_CHUNK_CHARS)
        .collect()
}

/// Parser for sentinel-delimited paper lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedParser;

impl ResponseParser for DelimitedParser {
    fn parse(&self, raw: &str, source: &str) -> Vec<Record> {
        let blocks: Vec<&str> = PAPER_BLOCK
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        let blocks = if blocks.is_empty() {
            debug!("no PAPER_START blocks, falling back to heuristic split");
            fallback_chunks(raw)
        } else {
            blocks
        };

        blocks
            .into_iter()
            .filter_map(|block| parse_block(block, source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UNKNOWN_AUTHOR, UNKNOWN_JOURNAL};

    const TWO_PAPERS: &str = "Here are the papers I found:

PAPER_START
Title: Osimertinib-induced acute glomerulonephritis: a case report
Authors: Tanaka K, Smith J
Journal: Clinical Kidney Journal
Year: 2023
PMID: 38012345
DOI: 10.1093/ckj/sfad001
URL: https://pubmed.ncbi.nlm.nih.gov/38012345/
Abstract: A 67-year-old woman developed nephrotic syndrome
three months after starting osimertinib.
Type: case_report
PAPER_END

PAPER_START
Title: Renal safety of EGFR tyrosine kinase inhibitors: a meta-analysis
Authors: Lee H, Garcia M, Chen W
Journal: Oncology Reviews
Year: 2022
PMID: N/A
DOI: N/A
URL: N/A
Abstract: Pooled analysis of 12 trials.
Type: meta_analysis
PAPER_END";

    #[test]
    fn parses_sentinel_blocks() {
        let records = DelimitedParser.parse(TWO_PAPERS, "PubMed");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(
            first.title,
            "Osimertinib-induced acute glomerulonephritis: a case report"
        );
        assert_eq!(first.authors, vec!["Tanaka K", "Smith J"]);
        assert_eq!(first.journal, "Clinical Kidney Journal");
        assert_eq!(first.publication_date, "2023");
        assert_eq!(first.pmid.as_deref(), Some("38012345"));
        assert_eq!(first.doi.as_deref(), Some("10.1093/ckj/sfad001"));
        assert_eq!(first.url, "https://pubmed.ncbi.nlm.nih.gov/38012345/");
        assert!(first.abstract_text.contains("three months after"));
        assert_eq!(first.literature_type, LiteratureType::CaseReport);
        assert_eq!(first.relevance, PROVISIONAL_RELEVANCE);
        assert_eq!(first.source, "PubMed");
    }

    #[test]
    fn placeholders_become_missing_identifiers() {
        let records = DelimitedParser.parse(TWO_PAPERS, "PubMed");
        let second = &records[1];
        assert_eq!(second.pmid, None);
        assert_eq!(second.doi, None);
        assert_eq!(second.url, "");
        assert_eq!(second.literature_type, LiteratureType::MetaAnalysis);
    }

    #[test]
    fn non_numeric_pmid_never_builds_url() {
        let reply = "PAPER_START
Title: Gefitinib and interstitial nephritis revisited
PMID: [PubMed ID if available]
URL: pubmed.ncbi.nlm.nih.gov/123
PAPER_END";
        let records = DelimitedParser.parse(reply, "PubMed");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid, None);
        assert_eq!(records[0].url, "");
    }

    #[test]
    fn url_synthesized_from_pmid_or_doi() {
        let reply = "PAPER_START
Title: Erlotinib-associated acute kidney injury
PMID: 1234567
PAPER_END
PAPER_START
Title: Afatinib and proteinuria in practice
DOI: https://doi.org/10.1000/abc
PAPER_END";
        let records = DelimitedParser.parse(reply, "Google Scholar");
        assert_eq!(records[0].url, "https://pubmed.ncbi.nlm.nih.gov/1234567/");
        assert_eq!(records[1].doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(records[1].url, "https://doi.org/10.1000/abc");
    }

    #[test]
    fn markdown_decorated_labels_are_recognized() {
        let reply = "PAPER_START
**Title:** [Dacomitinib nephrotoxicity in a single-centre cohort]
- **Authors**: A Author, B Author, C Author, D Author, E Author, F Author
**Journal:** [journal name]
**Type:** clinical study
PAPER_END";
        let records = DelimitedParser.parse(reply, "PubMed");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Dacomitinib nephrotoxicity in a single-centre cohort");
        assert_eq!(record.authors.len(), MAX_AUTHORS);
        assert_eq!(record.journal, "journal name");
        assert_eq!(record.literature_type, LiteratureType::ClinicalStudy);
    }

    #[test]
    fn block_with_short_title_is_dropped() {
        let reply = "PAPER_START\nTitle: Short\nAuthors: X\nPAPER_END";
        assert!(DelimitedParser.parse(reply, "PubMed").is_empty());
    }

    #[test]
    fn missing_fields_get_defaults() {
        let reply = "PAPER_START\nTitle: Kidney outcomes after osimertinib therapy\nPAPER_END";
        let records = DelimitedParser.parse(reply, "PubMed");
        assert_eq!(records[0].authors, vec![UNKNOWN_AUTHOR]);
        assert_eq!(records[0].journal, UNKNOWN_JOURNAL);
        assert_eq!(records[0].literature_type, LiteratureType::Other);
    }

    #[test]
    fn fallback_splits_on_repeated_titles() {
        let reply = "I could not use the requested format, but here are two papers.

Title: Osimertinib-associated minimal change disease in a lung cancer patient
Authors: Kim S, Park J
Journal: CEN Case Reports
Year: 2021
Type: case report

Title: Nephrotoxicity of third-generation EGFR inhibitors: a systematic review
Authors: Rossi L
Journal: Journal of Nephrology
Year: 2020
Type: systematic review";
        let records = DelimitedParser.parse(reply, "Academic Search");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].literature_type, LiteratureType::CaseReport);
        assert_eq!(records[1].literature_type, LiteratureType::SystematicReview);
        assert_eq!(records[1].journal, "Journal of Nephrology");
    }

    #[test]
    fn fallback_drops_short_chunks() {
        let reply = "1. Title: Tiny entry about kidneys\n2. Title: Another tiny entry here";
        assert!(DelimitedParser.parse(reply, "PubMed").is_empty());
    }

    #[test]
    fn unstructured_text_yields_nothing() {
        assert!(DelimitedParser.parse("I'm sorry, I cannot browse the web.", "PubMed").is_empty());
        assert!(DelimitedParser.parse("", "PubMed").is_empty());
    }

    #[test]
    fn type_mapping_is_closed() {
        assert_eq!(map_literature_type("Case Report"), LiteratureType::CaseReport);
        assert_eq!(map_literature_type("META-ANALYSIS"), LiteratureType::MetaAnalysis);
        assert_eq!(map_literature_type("randomized clinical trial"), LiteratureType::ClinicalStudy);
        assert_eq!(map_literature_type("review"), LiteratureType::Other);
        assert_eq!(map_literature_type(""), LiteratureType::Other);
    }

    #[test]
    fn reparsing_is_idempotent() {
        assert_eq!(DelimitedParser.parse(TWO_PAPERS, "PubMed"), DelimitedParser.parse(TWO_PAPERS, "PubMed"));
    }
}
