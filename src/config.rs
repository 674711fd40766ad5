use std::env;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const SCHOLAR_BASE: &str = "https://scholar.google.com";

/// Secret value that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: ApiKey,
    pub model: String,
    pub base_url: String,
}

/// Process-wide settings, loaded once at startup and read-only afterwards.
///
/// Environment variables:
/// - `GEMINI_API_KEY`: enables AI keyword extraction, source recommendation,
///   the Gemini search backend and the Scholar relevance gate (optional)
/// - `GEMINI_MODEL`: model name (default `gemini-2.0-flash`)
/// - `NCBI_API_KEY`: forwarded to E-utilities for a higher rate limit (optional)
/// - `LITSCOUT_PUBMED_URL` / `LITSCOUT_SCHOLAR_URL`: base URL overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: Option<GeminiConfig>,
    pub ncbi_api_key: Option<ApiKey>,
    pub eutils_base: String,
    pub scholar_base: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini = lookup("GEMINI_API_KEY")
            .as_deref()
            .and_then(ApiKey::new)
            .map(|api_key| GeminiConfig {
                api_key,
                model: non_blank("GEMINI_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: GEMINI_API_BASE.to_string(),
            });

        Self {
            gemini,
            ncbi_api_key: lookup("NCBI_API_KEY").as_deref().and_then(ApiKey::new),
            eutils_base: non_blank("LITSCOUT_PUBMED_URL")
                .unwrap_or_else(|| EUTILS_BASE.to_string()),
            scholar_base: non_blank("LITSCOUT_SCHOLAR_URL")
                .unwrap_or_else(|| SCHOLAR_BASE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn missing_gemini_key_disables_ai() {
        let config = config_from(&[]);
        assert!(config.gemini.is_none());
        assert!(config.ncbi_api_key.is_none());
        assert_eq!(config.eutils_base, EUTILS_BASE);
        assert_eq!(config.scholar_base, SCHOLAR_BASE);
    }

    #[test]
    fn blank_gemini_key_counts_as_missing() {
        let config = config_from(&[("GEMINI_API_KEY", "   ")]);
        assert!(config.gemini.is_none());
    }

    #[test]
    fn gemini_key_uses_default_model() {
        let config = config_from(&[("GEMINI_API_KEY", " secret ")]);
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key.expose(), "secret");
        assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn model_and_base_urls_can_be_overridden() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
            ("LITSCOUT_SCHOLAR_URL", "http://mirror.test"),
            ("NCBI_API_KEY", "ncbi"),
        ]);
        assert_eq!(config.gemini.unwrap().model, "gemini-2.5-flash");
        assert_eq!(config.scholar_base, "http://mirror.test");
        assert_eq!(config.ncbi_api_key.unwrap().expose(), "ncbi");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        assert_eq!(format!("{key:?}"), "[REDACTED]");
    }
}
