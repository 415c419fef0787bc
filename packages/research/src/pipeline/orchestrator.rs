//! The research orchestrator.
//!
//! One run: expand the question, gather search results, then drive one task
//! per result through fetch, extraction and summarization. All task futures
//! are polled from the run's own future (no spawned workers), so the task
//! table needs no locking.
//!
//! Two shared handles bound the work: a semaphore gating fetches and the
//! completion rate limiter gating every LLM call. A fetch only starts once a
//! permit is held, and the permit is released when the fetch finishes,
//! fails or is dropped.
//!
//! The run ends when every task is `Done` or `Failed`, the deadline passes,
//! or the cancellation token fires. Unfinished work is dropped, completed
//! summaries are kept and reassembled in rank order.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::progress::{Progress, ProgressEvent, Termination};
use super::task::{Exclusion, FailureReason, PageTask, Stage, TaskState, TaskTable};
use crate::error::{
    ConfigError, ErrorKind, FetchResult, ReportError, ResearchError, Result, SummarizeError,
    TransitionError,
};
use crate::extract::ContentExtractor;
use crate::fetchers::PageFetcher;
use crate::limits::CompletionRateLimiter;
use crate::report::json::write_json;
use crate::report::{PdfRenderer, ReportBuilder};
use crate::searchers::{gather, GatherOptions};
use crate::summarize::{QueryExpander, RateLimitedCompletion, RelevanceChecker, Summarizer};
use crate::traits::completion::CompletionService;
use crate::traits::searcher::{SearchResult, WebSearcher};
use crate::types::config::ResearchConfig;
use crate::types::fact::ExtractedFact;
use crate::types::page::PageContent;
use crate::types::query::ResearchQuery;
use crate::types::report::Report;
use crate::types::summary::Summary;

/// Result of [`ResearchOrchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,

    /// Search queries actually sent, question first.
    pub queries: Vec<String>,

    /// Unique search results, in rank order.
    pub results: Vec<SearchResult>,

    /// Summaries of pages that reached `Done`, in rank order.
    pub summaries: Vec<Summary>,

    /// Pages left out, in rank order.
    pub excluded: Vec<Exclusion>,

    pub termination: Termination,
    pub elapsed: Duration,
}

/// Result of [`ResearchOrchestrator::research`].
#[derive(Debug, Clone)]
pub struct ResearchOutput {
    pub report: Report,
    pub outcome: RunOutcome,
    pub pdf_path: PathBuf,
    pub json_path: Option<PathBuf>,
}

/// What a finished stage future hands back to the run loop.
enum StageOutput {
    Fetched {
        id: usize,
        result: FetchResult<PageContent>,
    },
    Summarized {
        id: usize,
        result: std::result::Result<Option<Summary>, SummarizeError>,
    },
}

type StageFuture<'a> = BoxFuture<'a, StageOutput>;

/// Drives research runs.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = ResearchOrchestrator::builder(config)
///     .searcher(Arc::new(DuckDuckGoSearcher::new()?))
///     .completion(Arc::new(service))
///     .build()?;
///
/// let query = ResearchQuery::new("How do heat pumps work?", 10)?;
/// let output = orchestrator.research(&query).await?;
/// orchestrator.shutdown().await;
/// ```
pub struct ResearchOrchestrator {
    config: ResearchConfig,
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<PageFetcher>,
    extractor: ContentExtractor,
    summarizer: Summarizer,
    expander: Option<QueryExpander>,
    relevance: Option<RelevanceChecker>,
    fetch_pool: Arc<Semaphore>,
    report_builder: ReportBuilder,
    pdf: PdfRenderer,
    progress: Progress,
    cancel: CancellationToken,
}

impl ResearchOrchestrator {
    pub fn builder(config: ResearchConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Token that cancels the current and any later run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The fetch concurrency pool.
    pub fn fetch_pool(&self) -> &Arc<Semaphore> {
        &self.fetch_pool
    }

    /// Run the pipeline and collect summaries without building a report.
    ///
    /// Fails when the search itself fails, or when the deadline passes (or
    /// the run is cancelled) before any page completed.
    pub async fn run(&self, query: &ResearchQuery) -> Result<RunOutcome> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let run_id = query.id();

        info!(run_id = %run_id, query = %query.text(), "Research run started");
        self.progress.emit(ProgressEvent::RunStarted {
            run_id,
            query: query.text().to_string(),
        });

        let (queries, results) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.finish_early(run_id, Termination::Cancelled, started);
                return Err(ResearchError::Cancelled);
            }
            _ = sleep_until(deadline) => {
                self.finish_early(run_id, Termination::TimedOut, started);
                return Err(ResearchError::DeadlineExceeded { timeout: self.config.timeout });
            }
            searched = self.search(query) => searched?,
        };

        self.progress.emit(ProgressEvent::SearchCompleted {
            queries: queries.clone(),
            results: results.len(),
        });
        if results.is_empty() {
            warn!(query = %query.text(), "Search returned no results");
        }

        let mut table = TaskTable::new(results.clone());
        let termination = self.drive(&mut table, query.text(), deadline).await?;

        if termination != Termination::Completed {
            for id in table.cancel_pending() {
                if let Some(task) = table.get(id) {
                    warn!(url = %task.url(), rank = task.rank(), state = %task.state(), "Page excluded, run ended first");
                    self.emit_task(task);
                }
            }
        }

        let summaries = table.summaries_in_rank_order();
        let excluded = table.exclusions();
        let elapsed = started.elapsed();

        info!(
            run_id = %run_id,
            termination = ?termination,
            done = summaries.len(),
            failed = excluded.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Research run finished"
        );
        self.progress.emit(ProgressEvent::RunFinished {
            run_id,
            termination,
            done: summaries.len(),
            failed: excluded.len(),
            elapsed,
        });

        if summaries.is_empty() {
            match termination {
                Termination::TimedOut => {
                    return Err(ResearchError::DeadlineExceeded {
                        timeout: self.config.timeout,
                    })
                }
                Termination::Cancelled => return Err(ResearchError::Cancelled),
                Termination::Completed => {}
            }
        }

        Ok(RunOutcome {
            run_id,
            queries,
            results,
            summaries,
            excluded,
            termination,
            elapsed,
        })
    }

    /// Run the pipeline, build the report and write it to the configured
    /// output paths. The JSON copy, when configured, is written before the
    /// PDF.
    ///
    /// Fails before searching when no PDF font can be loaded. Nothing is
    /// written when the run produced no summaries.
    pub async fn research(&self, query: &ResearchQuery) -> Result<ResearchOutput> {
        let pdf = self.pdf.clone();
        tokio::task::spawn_blocking(move || pdf.check_font())
            .await
            .map_err(|e| ReportError::Render(format!("font check failed: {e}")))??;

        let outcome = self.run(query).await?;
        let report = self.report_builder.build(query, &outcome.summaries)?;

        let json_path = self.config.json_output_path.clone();
        if let Some(path) = &json_path {
            write_json(&report, path).await?;
            info!(path = %path.display(), "JSON report written");
        }

        let pdf_path = self.config.output_path.clone();
        self.pdf.write(&report, &pdf_path).await?;

        Ok(ResearchOutput {
            report,
            outcome,
            pdf_path,
            json_path,
        })
    }

    /// Release fetcher resources (the headless browser).
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    async fn search(&self, query: &ResearchQuery) -> Result<(Vec<String>, Vec<SearchResult>)> {
        let queries = match &self.expander {
            Some(expander) => expander.expand(query.text()).await,
            None => vec![query.text().to_string()],
        };

        // The tighter of the run-wide cap and the per-query request wins
        let limit = self.config.max_results.min(query.max_results());
        let options = GatherOptions::new(limit)
            .with_interval(self.config.search_interval)
            .with_retry(self.config.search_retry.clone());
        let results = gather(self.searcher.as_ref(), &queries, &options).await?;

        Ok((queries, results))
    }

    /// The scheduling loop. Returns once every task is terminal, the
    /// deadline passes or the run is cancelled; dropping the in-flight set
    /// on return cancels whatever is still running.
    async fn drive<'a>(
        &'a self,
        table: &mut TaskTable,
        query: &'a str,
        deadline: Instant,
    ) -> std::result::Result<Termination, TransitionError> {
        let mut queue: VecDeque<usize> = (0..table.len()).collect();
        let mut in_flight: FuturesUnordered<StageFuture<'a>> = FuturesUnordered::new();

        let timer = sleep_until(deadline);
        tokio::pin!(timer);

        loop {
            if queue.is_empty() && in_flight.is_empty() {
                return Ok(Termination::Completed);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Termination::Cancelled),
                _ = &mut timer => return Ok(Termination::TimedOut),
                Some(output) = in_flight.next(), if !in_flight.is_empty() => {
                    self.advance(table, query, output, &mut in_flight)?;
                }
                permit = self.fetch_pool.clone().acquire_owned(), if !queue.is_empty() => {
                    let Ok(permit) = permit else {
                        warn!("Fetch pool closed, ending run");
                        return Ok(Termination::Cancelled);
                    };
                    if let Some(id) = queue.pop_front() {
                        self.start_fetch(table, id, permit, &mut in_flight)?;
                    }
                }
            }
        }
    }

    fn start_fetch<'a>(
        &'a self,
        table: &mut TaskTable,
        id: usize,
        permit: OwnedSemaphorePermit,
        in_flight: &mut FuturesUnordered<StageFuture<'a>>,
    ) -> std::result::Result<(), TransitionError> {
        let task = table.transition(id, TaskState::Fetching)?;
        self.emit_task(task);
        debug!(url = %task.url(), rank = task.rank(), "Fetch started");

        let url = task.url().clone();
        in_flight.push(
            async move {
                let result = self.fetcher.fetch(&url).await;
                drop(permit);
                StageOutput::Fetched { id, result }
            }
            .boxed(),
        );
        Ok(())
    }

    fn advance<'a>(
        &'a self,
        table: &mut TaskTable,
        query: &'a str,
        output: StageOutput,
        in_flight: &mut FuturesUnordered<StageFuture<'a>>,
    ) -> std::result::Result<(), TransitionError> {
        match output {
            StageOutput::Fetched { id, result: Ok(page) } => {
                debug!(
                    url = %page.url(),
                    method = ?page.method(),
                    bytes = page.body().len(),
                    hash = %page.content_hash(),
                    "Page fetched"
                );
                let task = table.transition(id, TaskState::Extracting)?;
                self.emit_task(task);

                match self.extractor.extract(&page) {
                    Ok(facts) => {
                        let task = table.transition(id, TaskState::Summarizing)?;
                        self.emit_task(task);
                        in_flight.push(self.summarize_task(task, query, &page, facts));
                    }
                    Err(e) => {
                        self.exclude(table, id, Stage::Extracting, e.kind(), e.to_string())?;
                    }
                }
            }
            StageOutput::Fetched { id, result: Err(e) } => {
                self.exclude(table, id, Stage::Fetching, e.kind(), e.to_string())?;
            }
            StageOutput::Summarized {
                id,
                result: Ok(Some(summary)),
            } => {
                let task = table.complete(id, summary)?;
                info!(url = %task.url(), rank = task.rank(), "Page summarized");
                self.emit_task(task);
            }
            StageOutput::Summarized { id, result: Ok(None) } => {
                self.exclude(
                    table,
                    id,
                    Stage::Summarizing,
                    ErrorKind::ContentUnavailable,
                    "judged not relevant to the question".to_string(),
                )?;
            }
            StageOutput::Summarized { id, result: Err(e) } => {
                self.exclude(table, id, Stage::Summarizing, e.kind(), e.to_string())?;
            }
        }
        Ok(())
    }

    fn summarize_task<'a>(
        &'a self,
        task: &PageTask,
        query: &'a str,
        page: &PageContent,
        facts: Vec<ExtractedFact>,
    ) -> StageFuture<'a> {
        let id = task.id;
        let rank = task.rank();
        let source_url = task.url().clone();
        let title = page
            .title()
            .map(str::to_string)
            .or_else(|| task.result.title.clone());
        let fetched_at = page.fetched_at();

        async move {
            let result = self.summarize_page(query, &facts).await.map(|summary| {
                summary.map(|s| {
                    Summary {
                        source_url,
                        rank,
                        ..s
                    }
                    .with_title(title)
                    .with_fetched_at(fetched_at)
                })
            });
            StageOutput::Summarized { id, result }
        }
        .boxed()
    }

    /// `None` when the relevance gate rejects the page.
    async fn summarize_page(
        &self,
        query: &str,
        facts: &[ExtractedFact],
    ) -> std::result::Result<Option<Summary>, SummarizeError> {
        if let Some(checker) = &self.relevance {
            if !checker.is_relevant(query, facts).await? {
                return Ok(None);
            }
        }
        Ok(Some(self.summarizer.summarize(query, facts).await?))
    }

    fn exclude(
        &self,
        table: &mut TaskTable,
        id: usize,
        stage: Stage,
        kind: ErrorKind,
        message: String,
    ) -> std::result::Result<(), TransitionError> {
        let task = table.fail(
            id,
            FailureReason::Error {
                stage,
                kind,
                message: message.clone(),
            },
        )?;
        warn!(
            url = %task.url(),
            rank = task.rank(),
            stage = %stage,
            kind = %kind,
            error = %message,
            "Page excluded"
        );
        self.emit_task(task);
        Ok(())
    }

    fn emit_task(&self, task: &PageTask) {
        self.progress.emit(ProgressEvent::TaskChanged {
            task: task.id,
            rank: task.rank(),
            url: task.url().clone(),
            state: task.state().clone(),
        });
    }

    fn finish_early(&self, run_id: Uuid, termination: Termination, started: Instant) {
        warn!(run_id = %run_id, termination = ?termination, "Run ended before search completed");
        self.progress.emit(ProgressEvent::RunFinished {
            run_id,
            termination,
            done: 0,
            failed: 0,
            elapsed: started.elapsed(),
        });
    }
}

/// Builder for [`ResearchOrchestrator`].
///
/// A searcher and a completion service are required. Everything else falls
/// back to what the config describes; pass explicit handles to share a
/// fetch pool or rate limiter between orchestrators.
pub struct OrchestratorBuilder {
    config: ResearchConfig,
    searcher: Option<Arc<dyn WebSearcher>>,
    completion: Option<Arc<dyn CompletionService>>,
    fetcher: Option<Arc<PageFetcher>>,
    limiter: Option<Arc<CompletionRateLimiter>>,
    fetch_pool: Option<Arc<Semaphore>>,
    extractor: ContentExtractor,
    report_builder: ReportBuilder,
    pdf: PdfRenderer,
    progress: Option<UnboundedSender<ProgressEvent>>,
    cancel: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    pub fn new(config: ResearchConfig) -> Self {
        Self {
            config,
            searcher: None,
            completion: None,
            fetcher: None,
            limiter: None,
            fetch_pool: None,
            extractor: ContentExtractor::default(),
            report_builder: ReportBuilder::default(),
            pdf: PdfRenderer::default(),
            progress: None,
            cancel: None,
        }
    }

    pub fn searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<CompletionRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn fetch_pool(mut self, pool: Arc<Semaphore>) -> Self {
        self.fetch_pool = Some(pool);
        self
    }

    pub fn extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn report_builder(mut self, builder: ReportBuilder) -> Self {
        self.report_builder = builder;
        self
    }

    pub fn pdf_renderer(mut self, renderer: PdfRenderer) -> Self {
        self.pdf = renderer;
        self
    }

    pub fn progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<ResearchOrchestrator> {
        let config = self.config;
        config.validate()?;

        let searcher = self
            .searcher
            .ok_or_else(|| ConfigError::invalid("searcher", "a search backend is required"))?;
        let completion = self
            .completion
            .ok_or_else(|| ConfigError::invalid("completion", "a completion service is required"))?;

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => Arc::new(CompletionRateLimiter::new(config.summarizer_rate_limit)?),
        };
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(PageFetcher::from_config(&config)?),
        };
        let fetch_pool = self
            .fetch_pool
            .unwrap_or_else(|| Arc::new(Semaphore::new(config.fetch_concurrency)));

        let gateway = RateLimitedCompletion::new(completion, limiter, config.llm_retry.clone());
        let summarizer = Summarizer::new(gateway.clone(), config.max_input_tokens);
        let expander = config
            .expand_queries
            .then(|| QueryExpander::new(gateway.clone(), config.max_search_queries));
        let relevance = config
            .relevance_filter
            .then(|| RelevanceChecker::new(gateway.clone()));

        Ok(ResearchOrchestrator {
            config,
            searcher,
            fetcher,
            extractor: self.extractor,
            summarizer,
            expander,
            relevance,
            fetch_pool,
            report_builder: self.report_builder,
            pdf: self.pdf,
            progress: Progress::new(self.progress),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::limits::{RateLimit, RetryConfig};
    use crate::testing::{MockCompletion, MockFetchStrategy, MockSearcher};

    const ARTICLE: &str = "<html><body><article>\
        <p>Heat pumps move heat from outside air into the house.</p>\
        <p>They stay efficient well below freezing in modern designs.</p>\
        </article></body></html>";

    fn config() -> ResearchConfig {
        ResearchConfig::new()
            .with_browser_fallback(false)
            .with_query_expansion(false)
            .with_rate_limit(RateLimit::per_second(1000))
            .with_fetch_retry(RetryConfig::none())
            .with_search_retry(RetryConfig::none())
            .with_llm_retry(RetryConfig::none())
            .with_search_interval(Duration::ZERO)
    }

    fn orchestrator(
        config: ResearchConfig,
        searcher: MockSearcher,
        pages: MockFetchStrategy,
        completion: MockCompletion,
    ) -> ResearchOrchestrator {
        let fetcher = PageFetcher::new(Arc::new(pages)).with_retry(RetryConfig::none());
        ResearchOrchestrator::builder(config)
            .searcher(Arc::new(searcher))
            .fetcher(Arc::new(fetcher))
            .completion(Arc::new(completion))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_searcher() {
        let result = ResearchOrchestrator::builder(config())
            .completion(Arc::new(MockCompletion::new()))
            .build();
        assert!(matches!(result, Err(ResearchError::Config(_))));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = ResearchOrchestrator::builder(config().with_fetch_concurrency(0))
            .searcher(Arc::new(MockSearcher::new()))
            .completion(Arc::new(MockCompletion::new()))
            .build();
        assert!(matches!(result, Err(ResearchError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_summarizes_pages_in_rank_order() {
        let searcher = MockSearcher::new()
            .with_default_results(&["https://a.com/", "https://b.com/", "https://c.com/"]);
        let pages = MockFetchStrategy::new()
            .with_page("https://a.com/", ARTICLE)
            .with_page("https://b.com/", ARTICLE)
            .with_page("https://c.com/", ARTICLE)
            .with_delay("https://a.com/", Duration::from_millis(30));

        let orchestrator = orchestrator(config(), searcher, pages, MockCompletion::new());
        let query = ResearchQuery::new("how do heat pumps work", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        let ranks: Vec<usize> = outcome.summaries.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(outcome.summaries[0].source_url.as_str(), "https://a.com/");
        assert_eq!(outcome.summaries[0].title.as_deref(), Some("Result 1"));
        assert!(outcome.excluded.is_empty());
    }

    #[tokio::test]
    async fn test_missing_page_is_excluded() {
        let searcher = MockSearcher::new().with_default_results(&["https://a.com/", "https://gone.com/"]);
        let pages = MockFetchStrategy::new().with_page("https://a.com/", ARTICLE);

        let orchestrator = orchestrator(config(), searcher, pages, MockCompletion::new());
        let query = ResearchQuery::new("heat pumps", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].url.as_str(), "https://gone.com/");
        assert_eq!(outcome.excluded[0].reason.stage(), Stage::Fetching);
    }

    #[tokio::test]
    async fn test_rejected_summary_excludes_page() {
        let searcher = MockSearcher::new().with_default_results(&["https://a.com/", "https://b.com/"]);
        let pages = MockFetchStrategy::new()
            .with_page("https://a.com/", ARTICLE)
            .with_page("https://b.com/", ARTICLE);
        let completion = MockCompletion::new().with_failure_for(
            "https://b.com/",
            crate::error::CompletionError::ContentRejected("policy".into()),
        );

        let orchestrator = orchestrator(config(), searcher, pages, completion);
        let query = ResearchQuery::new("heat pumps", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.summaries.len(), 1);
        match &outcome.excluded[0].reason {
            FailureReason::Error { stage, kind, .. } => {
                assert_eq!(*stage, Stage::Summarizing);
                assert_eq!(*kind, ErrorKind::ServiceRejected);
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_results_completes_empty() {
        let orchestrator = orchestrator(
            config(),
            MockSearcher::new(),
            MockFetchStrategy::new(),
            MockCompletion::new(),
        );
        let query = ResearchQuery::new("nothing out there", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert!(outcome.results.is_empty());
        assert!(outcome.summaries.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_is_fatal() {
        let searcher = MockSearcher::new().with_error(
            "heat pumps",
            SearchError::unavailable("mock", "down"),
        );
        let orchestrator = orchestrator(config(), searcher, MockFetchStrategy::new(), MockCompletion::new());
        let query = ResearchQuery::new("heat pumps", 10).unwrap();

        let err = orchestrator.run(&query).await.unwrap_err();
        assert!(matches!(err, ResearchError::Search(_)));
    }

    #[tokio::test]
    async fn test_config_caps_results_below_query_limit() {
        let urls = ["https://a.com/", "https://b.com/", "https://c.com/", "https://d.com/", "https://e.com/"];
        let mut pages = MockFetchStrategy::new();
        for url in urls {
            pages = pages.with_page(url, ARTICLE);
        }
        let searcher = MockSearcher::new().with_default_results(&urls);

        let orchestrator = orchestrator(config().with_max_results(2), searcher, pages, MockCompletion::new());
        let query = ResearchQuery::new("heat pumps", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.summaries.len(), 2);
        assert_eq!(outcome.summaries[1].source_url.as_str(), "https://b.com/");
    }

    #[tokio::test]
    async fn test_query_limit_caps_results_below_config() {
        let searcher = MockSearcher::new()
            .with_default_results(&["https://a.com/", "https://b.com/", "https://c.com/"]);
        let pages = MockFetchStrategy::new()
            .with_page("https://a.com/", ARTICLE)
            .with_page("https://b.com/", ARTICLE)
            .with_page("https://c.com/", ARTICLE);

        let orchestrator = orchestrator(config().with_max_results(10), searcher, pages, MockCompletion::new());
        let query = ResearchQuery::new("heat pumps", 1).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_uses_search_retry_policy() {
        let searcher = MockSearcher::new()
            .with_default_results(&["https://a.com/"])
            .with_transient_failures(1, SearchError::unavailable("mock", "hiccup"));
        let pages = MockFetchStrategy::new().with_page("https://a.com/", ARTICLE);
        let retry = RetryConfig::default()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter();

        // Fetch retries stay disabled; only the search policy allows a second try
        let orchestrator = orchestrator(
            config().with_search_retry(retry),
            searcher,
            pages,
            MockCompletion::new(),
        );
        let query = ResearchQuery::new("heat pumps", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert_eq!(outcome.summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_relevance_filter_excludes_page() {
        let searcher = MockSearcher::new().with_default_results(&["https://a.com/"]);
        let pages = MockFetchStrategy::new().with_page("https://a.com/", ARTICLE);
        let completion = MockCompletion::new().with_response_for("Is the following article relevant", "NO");

        let orchestrator = orchestrator(
            config().with_relevance_filter(true),
            searcher,
            pages,
            completion,
        );
        let query = ResearchQuery::new("heat pumps", 10).unwrap();
        let outcome = orchestrator.run(&query).await.unwrap();

        assert!(outcome.summaries.is_empty());
        assert!(matches!(
            outcome.excluded[0].reason,
            FailureReason::Error {
                kind: ErrorKind::ContentUnavailable,
                ..
            }
        ));
    }
}
