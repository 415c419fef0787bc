//! Research CLI
//!
//! Runs one research question through the pipeline and writes a PDF report
//! (and optionally JSON). Settings come from flags, then `RESEARCH_*`
//! environment variables (a `.env` file is loaded first), then defaults.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use research::llm::OpenAiCompletion;
use research::{
    ApiKey, CompletionService, DuckDuckGoSearcher, PdfRenderer, ProgressEvent, RateLimit,
    ResearchConfig, ResearchOrchestrator, ResearchQuery, TaskState, TavilySearcher, Termination,
    WebSearcher,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{search_provider, LlmSettings, SearchProvider};

#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(about = "Search the web, summarize the best pages and write a cited PDF report")]
struct Cli {
    /// Research question (prompted for when omitted)
    query: Vec<String>,

    /// Maximum unique search results to process
    #[arg(long, env = "RESEARCH_MAX_RESULTS", default_value_t = 10)]
    max_results: usize,

    /// Maximum pages fetched at once
    #[arg(long, env = "RESEARCH_FETCH_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Completion call budget, e.g. 30/60s or 1/s
    #[arg(long, env = "RESEARCH_RATE_LIMIT", default_value = "30/60s")]
    rate_limit: RateLimit,

    /// Wall-clock deadline for the whole run, in seconds
    #[arg(long, env = "RESEARCH_TIMEOUT_SECS", default_value_t = 300)]
    timeout_secs: u64,

    /// PDF report path
    #[arg(short, long, env = "RESEARCH_OUTPUT", default_value = "research_report.pdf")]
    output: PathBuf,

    /// Also write the report as JSON to this path
    #[arg(long, env = "RESEARCH_JSON")]
    json: Option<PathBuf>,

    /// Never render pages in a headless browser
    #[arg(long, env = "RESEARCH_NO_BROWSER")]
    no_browser: bool,

    /// Search the question only, without generated queries
    #[arg(long, env = "RESEARCH_NO_EXPAND")]
    no_expand: bool,

    /// Ask the model whether each page is relevant before summarizing it
    #[arg(long, env = "RESEARCH_RELEVANCE_FILTER")]
    relevance_filter: bool,

    /// Search backend (default: tavily when TAVILY_API_KEY is set)
    #[arg(long, env = "SEARCH_PROVIDER", value_enum)]
    search_provider: Option<SearchProvider>,

    /// Completion model
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    base_url: Option<String>,

    /// Directory holding the report font files
    #[arg(long, env = "RESEARCH_FONT_DIR", requires = "font_family")]
    font_dir: Option<PathBuf>,

    /// Font family name inside --font-dir (e.g. LiberationSans)
    #[arg(long, env = "RESEARCH_FONT_FAMILY", requires = "font_dir")]
    font_family: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,research=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let question = match cli.query.is_empty() {
        true => prompt_for_question()?,
        false => cli.query.join(" "),
    };
    let query = ResearchQuery::new(question, cli.max_results).context("Invalid research question")?;

    let mut config = ResearchConfig::new()
        .with_max_results(cli.max_results)
        .with_fetch_concurrency(cli.concurrency)
        .with_rate_limit(cli.rate_limit)
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_output_path(&cli.output)
        .with_browser_fallback(!cli.no_browser)
        .with_query_expansion(!cli.no_expand)
        .with_relevance_filter(cli.relevance_filter);
    if let Some(path) = &cli.json {
        config = config.with_json_output_path(path);
    }

    let llm = LlmSettings::resolve(|name| std::env::var(name).ok(), cli.model, cli.base_url)?;
    let mut completion = OpenAiCompletion::new(llm.api_key, llm.model);
    if let Some(base_url) = llm.base_url {
        completion = completion.with_base_url(base_url);
    }
    let completion: Arc<dyn CompletionService> = Arc::new(completion);

    let tavily_key = std::env::var("TAVILY_API_KEY").ok().map(ApiKey::new);
    let provider = search_provider(cli.search_provider, tavily_key.as_ref());
    tracing::info!(provider = ?provider, "Search backend selected");
    let searcher: Arc<dyn WebSearcher> = match provider {
        SearchProvider::Tavily => {
            let key = tavily_key.context("TAVILY_API_KEY must be set for the tavily provider")?;
            Arc::new(TavilySearcher::new(key).context("Failed to create Tavily searcher")?)
        }
        SearchProvider::Duckduckgo => {
            Arc::new(DuckDuckGoSearcher::new().context("Failed to create DuckDuckGo searcher")?)
        }
    };

    let mut pdf = PdfRenderer::new();
    if let (Some(dir), Some(family)) = (cli.font_dir, cli.font_family) {
        pdf = pdf.with_font(dir, family);
    }

    let cancel = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();

    let orchestrator = ResearchOrchestrator::builder(config)
        .searcher(searcher)
        .completion(completion)
        .pdf_renderer(pdf)
        .progress(progress_tx)
        .cancellation(cancel.clone())
        .build()
        .context("Failed to configure research pipeline")?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, finishing with what is done...".yellow());
            cancel.cancel();
        }
    });
    let printer = tokio::spawn(print_progress(progress_rx));

    let result = orchestrator.research(&query).await;
    orchestrator.shutdown().await;
    // Dropping the orchestrator closes the progress channel
    drop(orchestrator);
    printer.await.ok();

    let output = result.context("Research run failed")?;

    if let Some(path) = &output.json_path {
        println!("{} {}", "JSON written to".bright_blue(), path.display());
    }

    println!();
    println!(
        "{} {} ({} sections, {} pages excluded)",
        "Report written to".bright_green().bold(),
        output.pdf_path.display(),
        output.report.sections.len(),
        output.outcome.excluded.len()
    );
    if output.outcome.termination != Termination::Completed {
        println!(
            "{}",
            "Run ended early, the report covers the pages finished in time.".yellow()
        );
    }

    Ok(())
}

fn prompt_for_question() -> Result<String> {
    print!("{} ", "Research question:".bright_cyan().bold());
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read question from stdin")?;
    Ok(line.trim().to_string())
}

async fn print_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::RunStarted { query, .. } => {
                println!("{} {}", "Researching:".bright_cyan().bold(), query);
            }
            ProgressEvent::SearchCompleted { queries, results } => {
                println!(
                    "{} {} results from {} queries",
                    "Search:".bright_cyan(),
                    results,
                    queries.len()
                );
            }
            ProgressEvent::TaskChanged { rank, url, state, .. } => match state {
                TaskState::Done => println!("  {} [{}] {}", "✓".green(), rank, url),
                TaskState::Failed { reason } => {
                    println!("  {} [{}] {} ({})", "✗".red(), rank, url, reason.to_string().dimmed())
                }
                _ => {}
            },
            ProgressEvent::RunFinished {
                done,
                failed,
                elapsed,
                ..
            } => {
                println!(
                    "{} {} summarized, {} excluded in {:.1}s",
                    "Finished:".bright_cyan(),
                    done,
                    failed,
                    elapsed.as_secs_f64()
                );
            }
        }
    }
}
