use chrono::Datelike;

use crate::model::KeywordSet;
use crate::sources::{GOOGLE_SCHOLAR, PUBMED, same_source};

const DRUG_TERMS: &[&str] = &[
    "osimertinib",
    "erlotinib",
    "gefitinib",
    "afatinib",
    "dacomitinib",
    "egfr inhibitor",
    "tyrosine kinase",
];

const CONDITION_TERMS: &[&str] = &[
    "nephrotoxicity",
    "glomerulonephritis",
    "nephritis",
    "nephrotic",
    "proteinuria",
    "renal",
    "kidney",
];

const SCHOLAR_SITES: &str =
    "(site:ncbi.nlm.nih.gov OR site:sciencedirect.com OR site:springer.com OR site:wiley.com)";

/// Inclusive publication-year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    /// `span` years back from the current year.
    pub fn recent(span: i32) -> Self {
        let to = chrono::Local::now().year();
        Self {
            from: to - span,
            to,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Categorized<'a> {
    pub drugs: Vec<&'a str>,
    pub conditions: Vec<&'a str>,
    pub general: Vec<&'a str>,
}

pub fn categorize(keywords: &KeywordSet) -> Categorized<'_> {
    let mut out = Categorized::default();
    for keyword in keywords.iter() {
        let lower = keyword.to_lowercase();
        let bucket = if DRUG_TERMS.iter().any(|t| lower.contains(t)) {
            &mut out.drugs
        } else if CONDITION_TERMS.iter().any(|t| lower.contains(t)) {
            &mut out.conditions
        } else {
            &mut out.general
        };
        bucket.push(keyword.as_str());
    }
    out
}

struct QuerySyntax {
    term: fn(&str) -> String,
    scope: Option<&'static str>,
    date_filter: Option<fn(YearRange) -> String>,
    joiner: &'static str,
}

fn quoted(keyword: &str) -> String {
    format!("\"{}\"", keyword.replace('"', ""))
}

fn pubmed_term(keyword: &str) -> String {
    format!("{}[Title/Abstract]", quoted(keyword))
}

fn pubmed_dates(years: YearRange) -> String {
    format!("{}:{}[pdat]", years.from, years.to)
}

fn numrange_dates(years: YearRange) -> String {
    format!("{}..{}", years.from, years.to)
}

const PUBMED_SYNTAX: QuerySyntax = QuerySyntax {
    term: pubmed_term,
    scope: None,
    date_filter: Some(pubmed_dates),
    joiner: " AND ",
};

const SCHOLAR_SYNTAX: QuerySyntax = QuerySyntax {
    term: quoted,
    scope: Some(SCHOLAR_SITES),
    date_filter: None,
    joiner: " ",
};

const DEFAULT_SYNTAX: QuerySyntax = QuerySyntax {
    term: quoted,
    scope: None,
    date_filter: Some(numrange_dates),
    joiner: " AND ",
};

const SYNTAX_TABLE: &[(&str, &QuerySyntax)] =
    &[(PUBMED, &PUBMED_SYNTAX), (GOOGLE_SCHOLAR, &SCHOLAR_SYNTAX)];

fn syntax_for(source: &str) -> &'static QuerySyntax {
    SYNTAX_TABLE
        .iter()
        .find(|(name, _)| same_source(name, source))
        .map_or(&DEFAULT_SYNTAX, |&(_, syntax)| syntax)
}

fn or_group(terms: &[&str], syntax: &QuerySyntax) -> String {
    let terms: Vec<String> = terms.iter().map(|t| (syntax.term)(t)).collect();
    format!("({})", terms.join(" OR "))
}

/// Builds the query for `source`. Never empty: with no keywords the result
/// is just the source's scope and/or date filter.
pub fn build_query(keywords: &KeywordSet, source: &str, years: YearRange) -> String {
    let syntax = syntax_for(source);
    let categories = categorize(keywords);

    let mut groups: Vec<String> = [
        &categories.drugs,
        &categories.conditions,
        &categories.general,
    ]
    .into_iter()
    .filter(|terms| !terms.is_empty())
    .map(|terms| or_group(terms, syntax))
    .collect();

    if groups.is_empty() && !keywords.is_empty() {
        let all: Vec<&str> = keywords.iter().map(String::as_str).collect();
        groups.push(or_group(&all, syntax));
    }

    let mut parts = Vec::new();
    if !groups.is_empty() {
        parts.push(groups.join(" AND "));
    }
    if let Some(scope) = syntax.scope {
        parts.push(scope.to_string());
    }
    if let Some(filter) = syntax.date_filter {
        parts.push(filter(years));
    }
    parts.join(syntax.joiner)
}
