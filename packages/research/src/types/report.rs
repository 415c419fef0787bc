//! Report document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One numbered source in the report's citation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based citation number, in section order.
    pub number: usize,
    pub url: Url,
    pub title: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl Citation {
    /// "[n] Title - url (retrieved YYYY-MM-DD HH:MM UTC)"
    pub fn line(&self) -> String {
        let retrieved = self.retrieved_at.format("%Y-%m-%d %H:%M UTC");
        match &self.title {
            Some(title) => format!("[{}] {} - {} (retrieved {})", self.number, title, self.url, retrieved),
            None => format!("[{}] {} (retrieved {})", self.number, self.url, retrieved),
        }
    }
}

/// One section per contributing source, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub rank: usize,
    pub heading: String,
    pub body: String,
    /// Number of the citation backing this section.
    pub citation: usize,
    pub source_url: Url,
}

/// The assembled research report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub query: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
    pub citations: Vec<Citation>,
}

impl Report {
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Source URLs in section order.
    pub fn source_urls(&self) -> Vec<&Url> {
        self.sections.iter().map(|s| &s.source_url).collect()
    }

    pub fn citation(&self, number: usize) -> Option<&Citation> {
        self.citations.iter().find(|c| c.number == number)
    }
}
