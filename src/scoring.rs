use crate::model::{LiteratureType, QueryContext, Record, RelevanceOrigin};

const TITLE_WEIGHT: f32 = 0.3;
const ABSTRACT_WEIGHT: f32 = 0.2;

/// Title phrases in priority order.
const TYPE_PHRASES: &[(&str, LiteratureType)] = &[
    ("case report", LiteratureType::CaseReport),
    ("systematic review", LiteratureType::SystematicReview),
    ("meta-analysis", LiteratureType::MetaAnalysis),
    ("clinical trial", LiteratureType::ClinicalStudy),
];

/// +0.3 per keyword found in the title, +0.2 per keyword found in the
/// abstract, case-insensitive, capped at 1.0.
pub fn score(record: &Record, ctx: &QueryContext) -> f32 {
    let title = record.title.to_lowercase();
    let abstract_text = record.abstract_text.to_lowercase();

    let total: f32 = ctx
        .keywords()
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .map(|keyword| {
            let mut points = 0.0;
            if title.contains(&keyword) {
                points += TITLE_WEIGHT;
            }
            if abstract_text.contains(&keyword) {
                points += ABSTRACT_WEIGHT;
            }
            points
        })
        .sum();

    total.min(1.0)
}

pub fn classify(record: &Record) -> LiteratureType {
    let title = record.title.to_lowercase();
    TYPE_PHRASES
        .iter()
        .find(|(phrase, _)| title.contains(phrase))
        .map_or(LiteratureType::Other, |&(_, kind)| kind)
}

/// Sets the final relevance and type of every record, once.
///
/// Records already assessed by the relevance gate keep their score. A title
/// that names no type leaves the parser's type in place.
pub fn finalize(records: &mut [Record], ctx: &QueryContext) {
    for record in records.iter_mut() {
        if record.relevance_origin == RelevanceOrigin::Scored {
            continue;
        }
        if record.relevance_origin != RelevanceOrigin::Assessed {
            record.relevance = score(record, ctx);
        }
        let kind = classify(record);
        if kind != LiteratureType::Other {
            record.literature_type = kind;
        }
        record.relevance_origin = RelevanceOrigin::Scored;
    }
}
