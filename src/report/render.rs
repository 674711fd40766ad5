use super::{Report, type_breakdown};
use crate::model::Record;

const ABSTRACT_PREVIEW_BYTES: usize = 300;

/// Escape characters that break Markdown link syntax: `[`, `]`, `(`, `)`.
fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Single-line text for a heading or list item.
fn single_line(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn format_paper(rank: usize, paper: &Record) -> String {
    let title = escape_md_link(&single_line(&paper.title));
    let mut out = if paper.url.is_empty() {
        format!("### {rank}. {title}\n\n")
    } else {
        format!("### {rank}. [{title}]({})\n\n", paper.url)
    };

    out.push_str(&format!("- Authors: {}\n", paper.authors.join(", ")));
    out.push_str(&format!(
        "- Journal: {} ({})\n",
        paper.journal, paper.publication_date
    ));
    out.push_str(&format!(
        "- Type: {} | Relevance: {:.2} | Source: {}\n",
        paper.literature_type, paper.relevance, paper.source
    ));
    if let Some(doi) = &paper.doi {
        out.push_str(&format!("- DOI: {doi}\n"));
    }
    if let Some(pmid) = &paper.pmid {
        out.push_str(&format!("- PMID: {pmid}\n"));
    }

    let abstract_text = single_line(&paper.abstract_text);
    if !abstract_text.is_empty() && abstract_text != paper.title {
        let preview = if abstract_text.len() > ABSTRACT_PREVIEW_BYTES {
            let end = abstract_text.floor_char_boundary(ABSTRACT_PREVIEW_BYTES);
            format!("{}...", &abstract_text[..end])
        } else {
            abstract_text
        };
        out.push_str(&format!("\n> {preview}\n"));
    }
    out.push('\n');
    out
}

pub fn format_report(report: &Report) -> String {
    let query = &report.query;
    let mut output = format!("# Literature Report: {}\n\n", single_line(query.question()));

    output.push_str(&format!("- Keywords: {}\n", query.keywords().joined()));
    output.push_str(&format!("- Sources: {}\n", query.sources().join(", ")));
    output.push_str(&format!("- Language: {}\n", query.language()));
    output.push_str(&format!(
        "- Papers: {} found, {} shown\n",
        report.total_found,
        report.papers.len()
    ));
    output.push_str(&format!("- Evidence level: {}\n\n", report.evidence_level));

    output.push_str("## Summary\n\n");
    output.push_str(&report.summary);
    output.push_str("\n\n");

    if !report.key_findings.is_empty() {
        output.push_str("## Key Findings\n\n");
        for finding in &report.key_findings {
            output.push_str(&format!("- {}\n", single_line(finding)));
        }
        output.push('\n');
    }

    if !report.papers.is_empty() {
        output.push_str("## Papers\n\n");
        let breakdown: Vec<String> = type_breakdown(&report.papers)
            .into_iter()
            .map(|(kind, n)| format!("{kind}: {n}"))
            .collect();
        output.push_str(&format!("{}\n\n", breakdown.join(" | ")));
        for (i, paper) in report.papers.iter().enumerate() {
            output.push_str(&format_paper(i + 1, paper));
        }
    }

    output.push_str("## Recommendations\n\n");
    for recommendation in &report.recommendations {
        output.push_str(&format!("- {recommendation}\n"));
    }

    output
}
