use tracing::{debug, warn};

use crate::gemini::{GenerateParams, TextGenerator};
use crate::model::KeywordSet;

/// Domain lexicon in confidence order.
const LEXICON: &[&str] = &[
    "osimertinib",
    "erlotinib",
    "gefitinib",
    "afatinib",
    "dacomitinib",
    "EGFR inhibitor",
    "tyrosine kinase inhibitor",
    "glomerulonephritis",
    "acute kidney injury",
    "nephrotic syndrome",
    "interstitial nephritis",
    "proteinuria",
    "acute",
    "nephrotoxicity",
    "renal",
    "kidney",
];

const DEFAULT_KEYWORDS: &[&str] = &["EGFR inhibitor", "glomerulonephritis"];

/// Lexicon match against the question; never empty.
pub fn lexicon_keywords(question: &str) -> KeywordSet {
    let lower = question.to_lowercase();
    let found: KeywordSet = LEXICON
        .iter()
        .copied()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .collect();
    if found.is_empty() {
        DEFAULT_KEYWORDS.iter().copied().collect()
    } else {
        found
    }
}

fn keyword_prompt(question: &str) -> String {
    format!(
        r#"You are a medical research expert. Analyze this research question and extract the most effective keywords for searching medical databases like PubMed.

Research Question: "{question}"

Instructions:
1. Extract 5-8 specific medical keywords that would be most effective for database searching
2. Include drug names, medical conditions, and relevant medical terms
3. Use exact medical terminology (e.g., "glomerulonephritis" not "kidney disease")
4. Include both generic and specific terms when relevant
5. Consider synonyms and alternative terms

Return ONLY a comma-separated list of keywords, nothing else.

Example format: osimertinib, EGFR inhibitor, acute glomerulonephritis, nephrotoxicity, renal adverse effects"#
    )
}

/// Turns a question into ranked keywords.
pub enum KeywordExtractor<G> {
    Lexicon,
    Ai(G),
}

impl<G: TextGenerator> KeywordExtractor<G> {
    pub fn from_client(client: Option<G>) -> Self {
        client.map_or(Self::Lexicon, Self::Ai)
    }

    pub async fn extract(&self, question: &str) -> KeywordSet {
        let client = match self {
            Self::Lexicon => return lexicon_keywords(question),
            Self::Ai(client) => client,
        };

        match client
            .generate(&keyword_prompt(question), &GenerateParams::default())
            .await
        {
            Ok(reply) => {
                let keywords = KeywordSet::from_comma_list(reply.trim());
                if keywords.is_empty() {
                    warn!("AI keyword extraction returned nothing, using lexicon");
                    lexicon_keywords(question)
                } else {
                    debug!(keywords = %keywords.joined(), "AI keywords extracted");
                    keywords
                }
            }
            Err(e) => {
                warn!(error = %e, "AI keyword extraction failed, using lexicon");
                lexicon_keywords(question)
            }
        }
    }
}
