//! Merge, filter and summarize scored records into a `Report`.

mod render;

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{LiteratureType, QueryContext, Record};

pub use render::format_report;

const TOP_FINDINGS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    High,
    Moderate,
    Low,
    VeryLow,
    Insufficient,
}

impl EvidenceLevel {
    /// Strongest study design present decides the level.
    pub fn from_records(records: &[Record]) -> Self {
        let has = |kind: LiteratureType| records.iter().any(|r| r.literature_type == kind);
        if records.is_empty() {
            EvidenceLevel::Insufficient
        } else if has(LiteratureType::SystematicReview) || has(LiteratureType::MetaAnalysis) {
            EvidenceLevel::High
        } else if has(LiteratureType::ClinicalStudy) {
            EvidenceLevel::Moderate
        } else if has(LiteratureType::CaseReport) {
            EvidenceLevel::Low
        } else {
            EvidenceLevel::VeryLow
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EvidenceLevel::High => "High",
            EvidenceLevel::Moderate => "Moderate",
            EvidenceLevel::Low => "Low",
            EvidenceLevel::VeryLow => "Very low",
            EvidenceLevel::Insufficient => "Insufficient",
        }
    }
}

impl std::fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    /// Records scoring below this are left out of the report.
    pub min_relevance: f32,
    pub max_papers: usize,
    /// Collapse records sharing a DOI or a normalized title.
    pub dedup: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            min_relevance: 0.0,
            max_papers: 50,
            dedup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub query: QueryContext,
    /// Size of the raw union before dedup and filtering.
    pub total_found: usize,
    pub papers: Vec<Record>,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub evidence_level: EvidenceLevel,
}

fn normalized_title(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the first record of each DOI / normalized-title group. Callers sort
/// by relevance first so the best-scoring duplicate survives.
fn dedup(records: Vec<Record>) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let doi_key = record.doi.as_ref().map(|d| format!("doi:{}", d.to_lowercase()));
            let title_key = format!("title:{}", normalized_title(&record.title));
            let duplicate = doi_key.as_ref().is_some_and(|k| seen.contains(k))
                || seen.contains(&title_key);
            if let Some(key) = doi_key {
                seen.insert(key);
            }
            seen.insert(title_key);
            !duplicate
        })
        .collect()
}

fn count_phrase(kind: LiteratureType, count: usize) -> String {
    let noun = match (kind, count) {
        (LiteratureType::MetaAnalysis, 1) => "meta-analysis",
        (LiteratureType::MetaAnalysis, _) => "meta-analyses",
        (LiteratureType::Other, 1) => "other paper",
        (LiteratureType::Other, _) => "other papers",
        (LiteratureType::CaseReport, 1) => "case report",
        (LiteratureType::CaseReport, _) => "case reports",
        (LiteratureType::ClinicalStudy, 1) => "clinical study",
        (LiteratureType::ClinicalStudy, _) => "clinical studies",
        (LiteratureType::SystematicReview, 1) => "systematic review",
        (LiteratureType::SystematicReview, _) => "systematic reviews",
    };
    format!("{count} {noun}")
}

/// Non-zero counts per literature type, in `LiteratureType::ALL` order.
pub fn type_breakdown(papers: &[Record]) -> Vec<(LiteratureType, usize)> {
    LiteratureType::ALL
        .iter()
        .map(|&kind| {
            (
                kind,
                papers.iter().filter(|p| p.literature_type == kind).count(),
            )
        })
        .filter(|&(_, n)| n > 0)
        .collect()
}

fn summarize(ctx: &QueryContext, total_found: usize, papers: &[Record]) -> String {
    let sources = ctx.sources().join(", ");
    if papers.is_empty() {
        return format!(
            "No papers on \"{}\" were retained from {total_found} found across {sources}.",
            ctx.question()
        );
    }
    let breakdown: Vec<String> = type_breakdown(papers)
        .into_iter()
        .map(|(kind, n)| count_phrase(kind, n))
        .collect();
    format!(
        "Searched {sources} for \"{}\" using keywords {}. Found {total_found} papers; \
         {} retained after scoring: {}.",
        ctx.question(),
        ctx.keywords().joined(),
        papers.len(),
        breakdown.join(", "),
    )
}

fn key_findings(ctx: &QueryContext, papers: &[Record]) -> Vec<String> {
    let mut findings: Vec<String> = papers
        .iter()
        .take(TOP_FINDINGS)
        .map(|p| {
            format!(
                "{} ({}, {}): {}, relevance {:.2}",
                p.title, p.journal, p.publication_date, p.literature_type, p.relevance
            )
        })
        .collect();

    for source in ctx.sources() {
        let n = papers.iter().filter(|p| p.source == *source).count();
        if n > 0 {
            findings.push(format!("{source} contributed {n} of the retained papers"));
        }
    }
    findings
}

fn recommendations(level: EvidenceLevel, papers: &[Record]) -> Vec<String> {
    let mut out = vec![
        match level {
            EvidenceLevel::High => {
                "Start from the systematic reviews and meta-analyses for pooled incidence estimates"
            }
            EvidenceLevel::Moderate => {
                "Review the clinical studies for incidence, onset timing and management data"
            }
            EvidenceLevel::Low => {
                "Evidence rests on case reports; treat the findings as hypothesis-generating"
            }
            EvidenceLevel::VeryLow => {
                "No study design could be identified; screen full texts before drawing conclusions"
            }
            EvidenceLevel::Insufficient => {
                "Broaden the keywords or add sources; nothing met the relevance threshold"
            }
        }
        .to_string(),
    ];

    if papers
        .iter()
        .any(|p| p.literature_type == LiteratureType::CaseReport)
    {
        out.push(
            "Compare case reports on onset after drug start, biopsy findings and recovery after withdrawal"
                .to_string(),
        );
    }

    let unverified = papers
        .iter()
        .filter(|p| p.doi.is_none() && p.pmid.is_none())
        .count();
    if unverified > 0 {
        out.push(format!(
            "Verify {unverified} paper(s) without a DOI or PMID before citing them"
        ));
    }
    if !papers.is_empty() {
        out.push("Monitor renal function in patients receiving EGFR inhibitors".to_string());
    }
    out
}

/// Builds the report from the union of every source's records, in source
/// order. Sorting is stable, so ties keep that order.
pub fn aggregate(ctx: QueryContext, records: Vec<Record>, options: &ReportOptions) -> Report {
    let total_found = records.len();
    let mut records = records;
    records.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    let records = if options.dedup { dedup(records) } else { records };

    let mut papers: Vec<Record> = records
        .into_iter()
        .filter(|r| r.relevance >= options.min_relevance)
        .collect();
    papers.truncate(options.max_papers);

    let evidence_level = EvidenceLevel::from_records(&papers);
    Report {
        summary: summarize(&ctx, total_found, &papers),
        key_findings: key_findings(&ctx, &papers),
        recommendations: recommendations(evidence_level, &papers),
        evidence_level,
        total_found,
        papers,
        query: ctx,
    }
}
