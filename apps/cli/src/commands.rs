//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use prospector_core::{CompletionClient, EnrichmentPipeline, OpenAiChat, PipelineProgress, RunReport};
use prospector_crawler::HttpFetcher;
use prospector_shared::{
    AppConfig, ExhaustedPolicy, PipelineOptions, RecordState, RetryPolicy, TargetRecord,
    init_config, load_config, load_config_from, resolve_secrets,
};
use prospector_storage::{CsvStore, SheetClient};
use tracing::{error, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector: turn a list of company websites into tailored outreach.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Scrape target company homepages and draft tailored sales outreach.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.prospector/prospector.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich every untried record and save the batch as CSV.
    Run {
        /// Continue from a previously saved CSV instead of loading the sheet.
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Output CSV (defaults to pipeline.output_path).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Records processed at once.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Stop the run when a stage exhausts its retries.
        #[arg(long)]
        abort_on_exhausted: bool,

        /// Push the scraped content column back to the sheet afterwards.
        #[arg(long)]
        push: bool,
    },

    /// Upload the content column of a saved CSV to the sheet.
    Push {
        /// CSV written by a previous run.
        #[arg(long)]
        from: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospector=info",
        1 => "prospector=debug",
        _ => "prospector=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run {
            resume,
            out,
            concurrency,
            abort_on_exhausted,
            push,
        } => {
            let args = RunArgs {
                resume,
                out,
                concurrency,
                abort_on_exhausted,
                push,
            };
            cmd_run(&config, args).await
        }
        Command::Push { from } => cmd_push(&config, &from).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

struct RunArgs {
    resume: Option<PathBuf>,
    out: Option<PathBuf>,
    concurrency: Option<usize>,
    abort_on_exhausted: bool,
    push: bool,
}

/// Merge flag overrides into the configured pipeline options.
fn pipeline_options(config: &AppConfig, args: &RunArgs) -> PipelineOptions {
    let mut options = PipelineOptions::from(config);
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }
    if args.abort_on_exhausted {
        options.on_exhausted = ExhaustedPolicy::Abort;
    }
    options
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, args: RunArgs) -> Result<()> {
    let secrets = resolve_secrets(config)?;
    let sheet = SheetClient::new(&secrets.sheet_endpoint, &config.sheet)?;

    let mut records = match &args.resume {
        Some(path) => {
            info!(path = %path.display(), "resuming from CSV");
            CsvStore::new(path, &config.sheet.url_column).load()?
        }
        None => sheet.load().await?,
    };

    let options = pipeline_options(config, &args);
    info!(
        records = records.len(),
        concurrency = options.concurrency,
        on_exhausted = ?options.on_exhausted,
        model = %config.completion.model,
        "starting enrichment run"
    );

    let fetcher = HttpFetcher::new(&config.fetch)?;
    let chat = OpenAiChat::from_config(&config.completion, &secrets.api_key)?;
    let completer = CompletionClient::new(chat, &config.completion.model, RetryPolicy::from(config));
    let pipeline = EnrichmentPipeline::new(Arc::new(fetcher), Arc::new(completer), options);

    let progress = CliProgress::new();
    let outcome = pipeline.run(&mut records, &progress).await;
    progress.finish();
    let report = outcome?;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.pipeline.output_path));
    let store = CsvStore::new(&out, &config.sheet.url_column);
    let saved = match store.save(&records) {
        Ok(()) => true,
        Err(e) => {
            error!(path = %out.display(), error = %e, "failed to save results");
            false
        }
    };

    if args.push {
        push_to_sheet(&sheet, &records).await;
    }

    print_summary(&report, saved.then_some(out.as_path()));
    Ok(())
}

async fn cmd_push(config: &AppConfig, from: &Path) -> Result<()> {
    let secrets = resolve_secrets(config)?;
    let records = CsvStore::new(from, &config.sheet.url_column).load()?;
    let sheet = SheetClient::new(&secrets.sheet_endpoint, &config.sheet)?;

    info!(path = %from.display(), records = records.len(), "pushing content to sheet");
    push_to_sheet(&sheet, &records).await;
    Ok(())
}

/// Update failures are logged, never fatal.
async fn push_to_sheet(sheet: &SheetClient, records: &[TargetRecord]) {
    match sheet.push_content(records).await {
        Ok(receipts) => {
            let rows: usize = receipts.iter().map(|r| r.rows).sum();
            println!("  Sheet updated: {rows} rows in {} batches", receipts.len());
        }
        Err(e) => error!(error = %e, "failed to update sheet"),
    }
}

fn print_summary(report: &RunReport, saved_to: Option<&Path>) {
    println!();
    println!("  Enrichment run finished");
    println!("  Records:    {}", report.total);
    println!("  Skipped:    {}", report.skipped);
    println!("  Enriched:   {}", report.enriched);
    println!("  Unresolved: {}", report.unresolved);
    println!("  Partial:    {}", report.partial);
    if let Some(path) = saved_to {
        println!("  Saved to:   {}", path.display());
    }
    println!(
        "  Time:       {:.1}s",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    println!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_done(&self, current: usize, total: usize, url: &str, state: RecordState) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {url} ({state})"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "prospector",
            "-vv",
            "run",
            "--resume",
            "data/output.csv",
            "--concurrency",
            "4",
            "--abort-on-exhausted",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run {
                resume,
                concurrency,
                abort_on_exhausted,
                push,
                ..
            } => {
                assert_eq!(resume, Some(PathBuf::from("data/output.csv")));
                assert_eq!(concurrency, Some(4));
                assert!(abort_on_exhausted);
                assert!(!push);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn flags_override_config() {
        let config = AppConfig::default();
        let args = RunArgs {
            resume: None,
            out: None,
            concurrency: Some(0),
            abort_on_exhausted: true,
            push: false,
        };

        let options = pipeline_options(&config, &args);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.on_exhausted, ExhaustedPolicy::Abort);

        let defaults = RunArgs {
            concurrency: None,
            abort_on_exhausted: false,
            ..args
        };
        assert_eq!(pipeline_options(&config, &defaults), PipelineOptions::from(&config));
    }
}
