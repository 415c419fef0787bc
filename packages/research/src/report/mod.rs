//! Report assembly and rendering.
//!
//! [`ReportBuilder`] turns summaries into an ordered [`Report`]; the
//! renderers in [`pdf`] and [`json`] write it out.

pub mod json;
pub mod pdf;

pub use pdf::PdfRenderer;

use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use crate::error::ReportError;
use crate::types::query::ResearchQuery;
use crate::types::report::{Citation, Report, ReportSection};
use crate::types::summary::Summary;

/// Assembles summaries into a report, one section per source.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    title: Option<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed report title instead of one derived from the question.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Build the report.
    ///
    /// Sections follow search rank, ties broken by URL. Each source is cited
    /// once. Fails with [`ReportError::Empty`] when there are no summaries.
    pub fn build(&self, query: &ResearchQuery, summaries: &[Summary]) -> Result<Report, ReportError> {
        if summaries.is_empty() {
            return Err(ReportError::Empty);
        }

        let mut ordered: Vec<&Summary> = summaries.iter().collect();
        ordered.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| a.source_url.as_str().cmp(b.source_url.as_str()))
        });

        let mut seen = HashSet::new();
        let mut sections = Vec::new();
        let mut citations = Vec::new();
        for summary in ordered {
            if !seen.insert(summary.source_url.as_str()) {
                continue;
            }
            let number = citations.len() + 1;
            citations.push(Citation {
                number,
                url: summary.source_url.clone(),
                title: summary.title.clone(),
                retrieved_at: summary.fetched_at,
            });
            sections.push(ReportSection {
                rank: summary.rank,
                heading: summary.display_title(),
                body: summary.condensed_text.clone(),
                citation: number,
                source_url: summary.source_url.clone(),
            });
        }

        let title = self
            .title
            .clone()
            .unwrap_or_else(|| format!("Research Report: {}", query.text()));

        info!(sections = sections.len(), "Report assembled");
        Ok(Report {
            title,
            query: query.text().to_string(),
            generated_at: Utc::now(),
            sections,
            citations,
        })
    }
}
