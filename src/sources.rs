use tracing::{debug, warn};

use crate::gemini::{GenerateParams, TextGenerator};
use crate::model::{KeywordSet, parse_source_list};

pub const PUBMED: &str = "PubMed";
pub const GOOGLE_SCHOLAR: &str = "Google Scholar";
pub const ACADEMIC_SEARCH: &str = "Academic Search";

const STATIC_SOURCES: &[&str] = &[PUBMED, GOOGLE_SCHOLAR];
const FAILURE_SOURCES: &[&str] = &[PUBMED, GOOGLE_SCHOLAR, "Embase"];

/// Case- and whitespace-insensitive source name comparison.
pub fn same_source(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn recommend_prompt(keywords: &KeywordSet) -> String {
    format!(
        r#"You are a medical research librarian. Based on these keywords, recommend the best 3-4 medical databases to search for research papers.

Keywords: {}

Available databases:
- PubMed (MEDLINE) - Primary medical literature
- Embase - European medical database
- Cochrane Library - Systematic reviews and clinical trials
- Google Scholar - Broad academic search
- Web of Science - Citation database
- CINAHL - Nursing and allied health
- Scopus - Scientific literature database

Instructions:
1. Choose 3-4 most relevant databases for these specific keywords
2. Prioritize databases that would have the most relevant papers
3. Consider the medical domain (oncology, nephrology, pharmacology)

Return ONLY a comma-separated list of database names, nothing else.

Example format: PubMed, Embase, Cochrane Library"#,
        keywords.joined()
    )
}

/// Proposes which sources to query for a keyword set.
pub enum SourceRecommender<G> {
    Static,
    Ai(G),
}

impl<G: TextGenerator> SourceRecommender<G> {
    pub fn from_client(client: Option<G>) -> Self {
        client.map_or(Self::Static, Self::Ai)
    }

    pub async fn recommend(&self, keywords: &KeywordSet) -> Vec<String> {
        let client = match self {
            Self::Static => return owned(STATIC_SOURCES),
            Self::Ai(client) => client,
        };

        match client
            .generate(&recommend_prompt(keywords), &GenerateParams::default())
            .await
        {
            Ok(reply) => {
                let sources = parse_source_list(reply.trim());
                if sources.is_empty() {
                    warn!("AI source recommendation returned nothing, using defaults");
                    owned(STATIC_SOURCES)
                } else {
                    debug!(sources = ?sources, "AI sources recommended");
                    sources
                }
            }
            Err(e) => {
                warn!(error = %e, "AI source recommendation failed, using defaults");
                owned(FAILURE_SOURCES)
            }
        }
    }
}
