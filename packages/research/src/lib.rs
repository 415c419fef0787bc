//! Query-Driven Web Research Pipeline
//!
//! Takes a natural-language question, searches the web, fetches the top
//! results concurrently (falling back to a headless browser for thin or
//! JavaScript-only pages), extracts readable passages, summarizes each page
//! through a rate-limited LLM, and assembles the summaries into a cited
//! report written as PDF (and optionally JSON).
//!
//! # Usage
//!
//! ```rust,ignore
//! use research::{DuckDuckGoSearcher, ResearchConfig, ResearchOrchestrator, ResearchQuery};
//! use research::llm::OpenAiCompletion;
//!
//! let config = ResearchConfig::new().with_output_path("report.pdf");
//! let orchestrator = ResearchOrchestrator::builder(config)
//!     .searcher(Arc::new(DuckDuckGoSearcher::new()?))
//!     .completion(Arc::new(OpenAiCompletion::new(api_key, "llama-3.3-70b-versatile")))
//!     .build()?;
//!
//! let query = ResearchQuery::new("What limits solid-state battery adoption?", 10)?;
//! let output = orchestrator.research(&query).await?;
//! println!("{} sections", output.report.sections.len());
//! orchestrator.shutdown().await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability interfaces (WebSearcher, PageFetchStrategy, CompletionService)
//! - [`types`] - Query, page, fact, summary, report and config types
//! - [`searchers`] - DuckDuckGo and Tavily backends, multi-query gathering
//! - [`fetchers`] - HTTP fetching with headless browser fallback
//! - [`extract`] - Boilerplate removal and passage extraction
//! - [`summarize`] - Chunk-then-merge summarization behind the rate limiter
//! - [`pipeline`] - Task state machine and the orchestrator
//! - [`report`] - Report assembly, PDF and JSON output
//! - [`limits`] - Rate limiting and retry with backoff
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod extract;
pub mod fetchers;
pub mod limits;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod searchers;
pub mod secret;
pub mod summarize;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    CompletionError, ConfigError, ErrorKind, ExtractError, FetchError, ReportError, ResearchError,
    SearchError, SummarizeError, TransitionError,
};
pub use traits::{
    completion::{Completion, CompletionRequest, CompletionService},
    fetcher::PageFetchStrategy,
    searcher::{SearchResult, WebSearcher},
};
pub use types::{
    config::ResearchConfig,
    fact::ExtractedFact,
    page::{FetchMethod, PageContent},
    query::ResearchQuery,
    report::{Citation, Report, ReportSection},
    summary::Summary,
};

// Re-export pipeline components
pub use pipeline::{
    Exclusion, FailureReason, OrchestratorBuilder, ProgressEvent, ResearchOrchestrator,
    ResearchOutput, RunOutcome, Stage, TaskState, TaskTable, Termination,
};

pub use extract::ContentExtractor;
pub use fetchers::{HttpFetcher, PageFetcher, RenderHeuristic};
pub use limits::{CompletionRateLimiter, RateLimit, RetryConfig};
pub use report::{PdfRenderer, ReportBuilder};
pub use searchers::{gather, DuckDuckGoSearcher, GatherOptions, TavilySearcher};
pub use secret::ApiKey;
pub use summarize::{QueryExpander, RateLimitedCompletion, RelevanceChecker, Summarizer};

#[cfg(feature = "browser")]
pub use fetchers::BrowserFetcher;

// Re-export testing utilities
pub use testing::{MockCompletion, MockFetchStrategy, MockSearcher};
