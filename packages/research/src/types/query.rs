//! The research question driving a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ResearchError, Result};

/// A research question. Created once per run and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    id: Uuid,
    text: String,
    max_results: usize,
    created_at: DateTime<Utc>,
}

impl ResearchQuery {
    /// Create a query, rejecting blank text or a zero result budget.
    pub fn new(text: impl Into<String>, max_results: usize) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(ResearchError::InvalidQuery {
                reason: "query text is empty".into(),
            });
        }
        if max_results == 0 {
            return Err(ResearchError::InvalidQuery {
                reason: "max_results must be at least 1".into(),
            });
        }

        Ok(Self {
            id: Uuid::now_v7(),
            text,
            max_results,
            created_at: Utc::now(),
        })
    }

    /// Run identifier, time-ordered.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_text() {
        let query = ResearchQuery::new("  rust async runtimes \n", 5).unwrap();
        assert_eq!(query.text(), "rust async runtimes");
        assert_eq!(query.max_results(), 5);
    }

    #[test]
    fn test_query_rejects_blank_text() {
        let err = ResearchQuery::new("   ", 5).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidQuery { .. }));
    }

    #[test]
    fn test_query_rejects_zero_results() {
        assert!(ResearchQuery::new("anything", 0).is_err());
    }

    #[test]
    fn test_query_ids_are_unique() {
        let a = ResearchQuery::new("a", 1).unwrap();
        let b = ResearchQuery::new("a", 1).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
