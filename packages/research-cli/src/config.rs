//! Settings the library does not own: API keys, provider choice, model.

use anyhow::{bail, Result};
use clap::ValueEnum;
use research::llm::openai::{DEFAULT_MODEL, GROQ_BASE_URL};
use research::ApiKey;

/// Which search backend to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchProvider {
    Duckduckgo,
    Tavily,
}

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: ApiKey,
    pub base_url: Option<String>,
    pub model: String,
}

impl LlmSettings {
    /// Resolve from `LLM_API_KEY`, `GROQ_API_KEY` or `OPENAI_API_KEY`, in
    /// that order. A Groq key without `LLM_BASE_URL` targets Groq.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let (api_key, default_base) = if let Some(key) = get("LLM_API_KEY") {
            (key, None)
        } else if let Some(key) = get("GROQ_API_KEY") {
            (key, Some(GROQ_BASE_URL.to_string()))
        } else if let Some(key) = get("OPENAI_API_KEY") {
            (key, None)
        } else {
            bail!("no LLM API key found, set LLM_API_KEY, GROQ_API_KEY or OPENAI_API_KEY");
        };

        Ok(Self {
            api_key: ApiKey::new(api_key),
            base_url: base_url.or(default_base),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Explicit choice wins, then Tavily when a key is present, else DuckDuckGo.
pub fn search_provider(
    explicit: Option<SearchProvider>,
    tavily_key: Option<&ApiKey>,
) -> SearchProvider {
    match (explicit, tavily_key) {
        (Some(provider), _) => provider,
        (None, Some(key)) if !key.is_empty() => SearchProvider::Tavily,
        _ => SearchProvider::Duckduckgo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_generic_key_wins() {
        let settings = LlmSettings::resolve(
            env(&[("LLM_API_KEY", "generic"), ("GROQ_API_KEY", "groq")]),
            None,
            None,
        )
        .unwrap();
        assert_eq!(settings.api_key.expose(), "generic");
        assert_eq!(settings.base_url, None);
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_groq_key_targets_groq() {
        let settings = LlmSettings::resolve(env(&[("GROQ_API_KEY", "gsk")]), None, None).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some(GROQ_BASE_URL));

        let custom = LlmSettings::resolve(
            env(&[("GROQ_API_KEY", "gsk")]),
            Some("qwen-qwq-32b".into()),
            Some("http://localhost:8000/v1".into()),
        )
        .unwrap();
        assert_eq!(custom.base_url.as_deref(), Some("http://localhost:8000/v1"));
        assert_eq!(custom.model, "qwen-qwq-32b");
    }

    #[test]
    fn test_missing_key() {
        assert!(LlmSettings::resolve(env(&[("LLM_API_KEY", "  ")]), None, None).is_err());
    }

    #[test]
    fn test_search_provider_choice() {
        let key = ApiKey::new("tvly-1");
        assert_eq!(search_provider(None, Some(&key)), SearchProvider::Tavily);
        assert_eq!(search_provider(None, None), SearchProvider::Duckduckgo);
        assert_eq!(
            search_provider(Some(SearchProvider::Duckduckgo), Some(&key)),
            SearchProvider::Duckduckgo
        );
    }
}
