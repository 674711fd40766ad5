use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::gemini::{GenerateParams, TextGenerator};
use crate::model::{KeywordSet, Record, RelevanceOrigin};

pub const NEUTRAL_RELEVANCE: f32 = 0.5;

static RELEVANT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t*]*relevant[ \t*]*:[ \t*]*(yes|no)\b").expect("relevant regex is valid")
});

/// `SCORE:` at a line start or after a `,` `;` `|` separator on the same line.
static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:^|[,;|])[ \t*]*score[ \t*]*:[ \t*]*(\d{1,3})")
        .expect("score regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Relevant(f32),
    NotRelevant,
}

/// Reads `RELEVANT: YES|NO` and `SCORE: <0-100>` from a reply. A YES
/// without a readable score counts as neutral.
pub fn parse_verdict(reply: &str) -> Option<Verdict> {
    let relevant = RELEVANT_LINE.captures(reply)?;
    if relevant[1].eq_ignore_ascii_case("no") {
        return Some(Verdict::NotRelevant);
    }
    let score = SCORE_LINE
        .captures(reply)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map_or(NEUTRAL_RELEVANCE, |n| n.min(100) as f32 / 100.0);
    Some(Verdict::Relevant(score))
}

fn gate_prompt(record: &Record, keywords: &KeywordSet) -> String {
    format!(
        "You are a medical literature screener. Decide whether this paper is relevant to a \
search about: {}

Title: {}
Abstract: {}

Answer in exactly this format and nothing else:
RELEVANT: YES or NO
SCORE: a number from 0 to 100",
        keywords.joined(),
        record.title,
        record.abstract_text,
    )
}

/// Drops records the model judges not relevant. A failed call keeps the
/// record at `NEUTRAL_RELEVANCE`.
pub struct RelevanceGate<G> {
    client: G,
}

impl<G: TextGenerator> RelevanceGate<G> {
    pub fn new(client: G) -> Self {
        Self { client }
    }

    async fn assess(&self, record: &Record, keywords: &KeywordSet) -> Verdict {
        match self
            .client
            .generate(&gate_prompt(record, keywords), &GenerateParams::default())
            .await
        {
            Ok(reply) => parse_verdict(&reply).unwrap_or_else(|| {
                warn!(title = %record.title, "unreadable relevance verdict, keeping record");
                Verdict::Relevant(NEUTRAL_RELEVANCE)
            }),
            Err(e) => {
                warn!(title = %record.title, error = %e, "relevance check failed, keeping record");
                Verdict::Relevant(NEUTRAL_RELEVANCE)
            }
        }
    }

    pub async fn screen(&self, records: Vec<Record>, keywords: &KeywordSet) -> Vec<Record> {
        let before = records.len();
        let mut kept = Vec::with_capacity(before);
        for mut record in records {
            match self.assess(&record, keywords).await {
                Verdict::Relevant(score) => {
                    record.relevance = score.clamp(0.0, 1.0);
                    record.relevance_origin = RelevanceOrigin::Assessed;
                    kept.push(record);
                }
                Verdict::NotRelevant => debug!(title = %record.title, "dropped as not relevant"),
            }
        }
        info!(before, kept = kept.len(), "relevance screening complete");
        kept
    }
}
