//! When to render a page in the browser instead of trusting plain HTTP.

use url::Url;

use crate::extract::visible_text_len;
use crate::types::config::ResearchConfig;
use crate::types::page::PageContent;

/// Predicate selecting the browser strategy.
#[derive(Debug, Clone)]
pub struct RenderHeuristic {
    thin_threshold: usize,
    dynamic_domains: Vec<String>,
}

impl RenderHeuristic {
    pub fn new(thin_threshold: usize, dynamic_domains: Vec<String>) -> Self {
        Self {
            thin_threshold,
            dynamic_domains: dynamic_domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(config.thin_content_threshold, config.dynamic_domains.clone())
    }

    /// Host is, or is a subdomain of, a known JavaScript-rendered site.
    pub fn is_dynamic(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.dynamic_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    /// The page carries less visible text than the threshold.
    pub fn is_thin(&self, page: &PageContent) -> bool {
        visible_text_len(page) < self.thin_threshold
    }
}
