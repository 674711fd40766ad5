use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::backends::{
    Backend, GeminiSearchBackend, PubMedBackend, RelevanceGate, ScholarBackend, SearchBackend,
};
use crate::config::Config;
use crate::gemini::{GeminiClient, TextGenerator};
use crate::keywords::KeywordExtractor;
use crate::model::{KeywordSet, QueryContext, QueryError, Record, parse_source_list};
use crate::report::{self, Report, ReportOptions};
use crate::scoring;
use crate::sources::SourceRecommender;

/// Caller input for one run. Comma-separated overrides replace the
/// extracted keywords or recommended sources.
#[derive(Debug, Clone)]
pub struct ResearchRequest<'a> {
    pub question: &'a str,
    pub keywords: Option<&'a str>,
    pub sources: Option<&'a str>,
    pub language: &'a str,
    /// Per-source record limit.
    pub limit: usize,
}

pub struct Pipeline<G> {
    keywords: KeywordExtractor<G>,
    recommender: SourceRecommender<G>,
    backends: Vec<Backend<G>>,
    options: ReportOptions,
}

impl Pipeline<GeminiClient> {
    /// Without a Gemini key the deterministic extractor and recommender are
    /// used, the Gemini backend is left out and Scholar results skip the
    /// relevance gate.
    pub fn from_config(config: &Config, http: Client, options: ReportOptions) -> Self {
        let gemini = GeminiClient::from_config(http.clone(), config.gemini.as_ref())
            .inspect_err(|e| warn!("AI features disabled: {e}"))
            .ok();

        let mut backends = vec![Backend::PubMed(PubMedBackend::new(
            http.clone(),
            &config.eutils_base,
            config.ncbi_api_key.clone(),
        ))];
        if let Some(client) = &gemini {
            backends.push(Backend::Gemini(GeminiSearchBackend::new(client.clone())));
        }
        backends.push(Backend::Scholar(ScholarBackend::new(
            http,
            &config.scholar_base,
            gemini.clone().map(RelevanceGate::new),
        )));

        Self::new(
            KeywordExtractor::from_client(gemini.clone()),
            SourceRecommender::from_client(gemini),
            backends,
            options,
        )
    }
}

impl<G: TextGenerator> Pipeline<G> {
    pub fn new(
        keywords: KeywordExtractor<G>,
        recommender: SourceRecommender<G>,
        backends: Vec<Backend<G>>,
        options: ReportOptions,
    ) -> Self {
        Self {
            keywords,
            recommender,
            backends,
            options,
        }
    }

    pub async fn prepare(&self, request: &ResearchRequest<'_>) -> Result<QueryContext, QueryError> {
        if request.question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let keywords = match request.keywords {
            Some(list) => KeywordSet::from_comma_list(list),
            None => self.keywords.extract(request.question).await,
        };
        let sources = match request.sources {
            Some(list) => parse_source_list(list),
            None => self.recommender.recommend(&keywords).await,
        };

        QueryContext::new(request.question, keywords, sources, request.language)
    }

    /// Runs every (source, backend) pair concurrently and concatenates the
    /// results in source order, then backend order.
    pub async fn collect(&self, ctx: &QueryContext, limit: usize) -> Vec<Record> {
        for source in ctx.sources() {
            if !self.backends.iter().any(|b| b.supports(source)) {
                info!(source = %source, "no backend serves this source, skipping");
            }
        }

        let searches = ctx.sources().iter().flat_map(|source| {
            self.backends
                .iter()
                .filter(move |backend| backend.supports(source))
                .map(move |backend| {
                    debug!(source = %source, backend = backend.name(), "dispatching search");
                    backend.search(ctx.keywords(), source, limit)
                })
        });
        let per_search: Vec<Vec<Record>> = join_all(searches).await;

        per_search.into_iter().flatten().collect()
    }

    pub async fn run(&self, request: &ResearchRequest<'_>) -> Result<Report, QueryError> {
        let ctx = self.prepare(request).await?;
        info!(
            keywords = %ctx.keywords().joined(),
            sources = %ctx.sources().join(", "),
            "query prepared"
        );

        let mut records = self.collect(&ctx, request.limit).await;
        scoring::finalize(&mut records, &ctx);

        let report = report::aggregate(ctx, records, &self.options);
        info!(
            total = report.total_found,
            kept = report.papers.len(),
            evidence = %report.evidence_level,
            "report ready"
        );
        Ok(report)
    }
}
