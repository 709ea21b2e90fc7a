//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sidequest_cache::RefreshingCache;
use sidequest_core::{
    ItineraryResponse, OpenRouterClient, Orchestrator, PipelineObserver, RetryingGeneration,
    StageId, TraceEntry, TraceStatus,
};
use sidequest_shared::{
    AppConfig, CacheOptions, ItineraryRequest, PipelineOptions, init_config, load_config,
};
use sidequest_sources::SourceAggregator;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Sidequest: plan a day of hidden gems.
#[derive(Parser)]
#[command(
    name = "sidequest",
    version,
    about = "Plan a day of local experiences from a natural language request.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Plan an itinerary.
    Plan(PlanArgs),

    /// List aggregated source experiences for a city.
    Experiences {
        /// City to fetch (defaults to the configured city).
        #[arg(long)]
        city: Option<String>,

        /// Only show this category.
        #[arg(long)]
        category: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Keep the experience cache warm until Ctrl-C.
    Refresh {
        /// City to refresh (repeatable; defaults to `cache.refresh_cities`).
        #[arg(long)]
        city: Vec<String>,

        /// Seconds between refresh cycles (defaults to `cache.refresh_interval_secs`).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `sidequest plan`.
#[derive(clap::Args)]
pub(crate) struct PlanArgs {
    /// JSON request file. Flags below override its fields.
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// What you want to do, in plain words.
    #[arg(short, long)]
    pub query: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    #[arg(long)]
    pub budget_min: Option<i64>,

    #[arg(long)]
    pub budget_max: Option<i64>,

    #[arg(long)]
    pub party_size: Option<u32>,

    /// Interest pod (repeatable), e.g. `food_nerd`.
    #[arg(long = "interest")]
    pub interests: Vec<String>,

    /// Day start in HH:MM.
    #[arg(long)]
    pub start_time: Option<String>,

    /// Hours available for the day.
    #[arg(long)]
    pub hours: Option<f64>,

    /// Print the full response as JSON.
    #[arg(long)]
    pub json: bool,

    /// Skip source listings and let Discovery work from the request alone.
    #[arg(long)]
    pub no_cache: bool,
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
        0 => "sidequest=info",
        1 => "sidequest=debug",
        _ => "sidequest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Plan(args) => cmd_plan(args).await,
        Command::Experiences {
            city,
            category,
            json,
        } => cmd_experiences(city, category.as_deref(), json).await,
        Command::Refresh { city, interval } => cmd_refresh(city, interval).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn build_cache(config: &AppConfig) -> Result<Arc<RefreshingCache>> {
    let aggregator = SourceAggregator::from_config(&config.sources)?;
    info!(sources = ?aggregator.source_names(), "experience sources ready");
    let options = CacheOptions::from(&config.cache);
    Ok(Arc::new(RefreshingCache::with_options(
        Arc::new(aggregator),
        &options,
    )))
}

fn load_request(args: &PlanArgs, config: &AppConfig) -> Result<ItineraryRequest> {
    let mut request = match &args.request {
        Some(path) => read_request(path)?,
        None => ItineraryRequest::with_defaults("", &config.defaults),
    };

    if let Some(query) = &args.query {
        request.query = query.clone();
    }
    if let Some(city) = &args.city {
        request.city = city.clone();
    }
    if let Some(min) = args.budget_min {
        request.budget_min = min;
    }
    if let Some(max) = args.budget_max {
        request.budget_max = max;
    }
    if let Some(size) = args.party_size {
        request.party_size = size;
    }
    if !args.interests.is_empty() {
        request.interest_pods = args.interests.clone();
    }
    if let Some(start) = &args.start_time {
        request.start_time = Some(start.clone());
    }
    if let Some(hours) = args.hours {
        request.available_hours = Some(hours);
    }
    Ok(request)
}

fn read_request(path: &Path) -> Result<ItineraryRequest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read request file '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| eyre!("invalid request file '{}': {e}", path.display()))
}

async fn cmd_plan(args: PlanArgs) -> Result<()> {
    let config = load_config()?;
    let request = load_request(&args, &config)?;

    let client = OpenRouterClient::from_config(&config)?;
    info!(model = client.model(), city = %request.city, "planning itinerary");
    let generation = Arc::new(RetryingGeneration::from_config(client, &config.generation));

    let mut orchestrator = Orchestrator::new(generation, &PipelineOptions::from(&config));
    let cache = if args.no_cache {
        None
    } else {
        let cache = build_cache(&config)?;
        if config.cache.auto_refresh {
            let options = CacheOptions::from(&config.cache);
            cache
                .start_background_refresh(options.refresh_cities, options.refresh_interval)
                .await?;
        }
        orchestrator = orchestrator.with_cache(cache.clone());
        Some(cache)
    };

    let progress = CliProgress::new();
    let result = orchestrator.run(&request, &progress).await;
    progress.finish();

    if let Some(cache) = cache {
        let timeout = Duration::from_secs(config.cache.stop_timeout_secs);
        cache.stop_background_refresh(timeout).await;
    }

    let response = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_itinerary(&response);
    }
    Ok(())
}

fn print_itinerary(response: &ItineraryResponse) {
    println!();
    if response.narrative_itinerary.is_empty() {
        println!("  No itinerary could be written for this request.");
    } else {
        println!("{}", response.narrative_itinerary);
    }
    println!();

    if !response.experiences.is_empty() {
        println!("  Experiences:");
        for exp in &response.experiences {
            println!("    - {} [{}] ~{}", exp.name, exp.category, exp.budget);
        }
        println!();
    }

    if let Some(collision) = &response.collision_suggestion {
        println!("  Try something different: {}", collision.title);
        if !collision.why.is_empty() {
            println!("    {}", collision.why);
        }
        println!();
    }

    if let Some(cost) = &response.budget_breakdown {
        let verdict = if cost.within_budget {
            "within budget"
        } else {
            "over budget"
        };
        println!("  Estimated total: {} ({verdict})", cost.total_estimate);
        println!();
    }

    for error in &response.errors {
        println!("  ! {} failed: {}", error.stage, error.error);
    }
    println!("  Session: {}", response.session_id);
    println!();
}

async fn cmd_experiences(city: Option<String>, category: Option<&str>, json: bool) -> Result<()> {
    let config = load_config()?;
    let city = city.unwrap_or_else(|| config.defaults.city.clone());
    let cache = build_cache(&config)?;

    let experiences = cache.get_or_fetch(&city, category).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&experiences)?);
        return Ok(());
    }

    println!();
    println!("  {} experiences in {city}", experiences.len());
    println!();
    for exp in &experiences {
        println!(
            "  {:<45} {:<10} {:<22} {}-{}",
            exp.name, exp.category, exp.source_name, exp.budget_min, exp.budget_max
        );
    }
    println!();
    Ok(())
}

async fn cmd_refresh(cities: Vec<String>, interval: Option<u64>) -> Result<()> {
    let config = load_config()?;
    let mut options = CacheOptions::from(&config.cache);
    if !cities.is_empty() {
        options.refresh_cities = cities;
    }
    if let Some(secs) = interval {
        options.refresh_interval = Duration::from_secs(secs);
    }
    if options.refresh_cities.is_empty() {
        return Err(eyre!("no cities to refresh: pass --city or set cache.refresh_cities"));
    }

    let cache = build_cache(&config)?;
    info!(
        cities = ?options.refresh_cities,
        interval_secs = options.refresh_interval.as_secs(),
        "starting background refresh"
    );
    cache
        .start_background_refresh(options.refresh_cities.clone(), options.refresh_interval)
        .await?;

    println!("Refreshing {} (Ctrl-C to stop)", options.refresh_cities.join(", "));
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("failed to listen for Ctrl-C: {e}"))?;

    if !cache.stop_background_refresh(options.stop_timeout).await {
        warn!("refresh worker was not running at shutdown");
    }

    let stats = cache.stats().await;
    println!();
    println!("  Entries:     {}", stats.total_entries);
    println!("  Valid:       {}", stats.valid_entries);
    println!("  Expired:     {}", stats.expired_entries);
    println!("  Experiences: {}", stats.total_experiences);
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Stage progress rendered as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineObserver for CliProgress {
    fn stage_started(&self, stage: StageId) {
        self.spinner.set_message(format!("Running {stage}..."));
    }

    fn stage_finished(&self, entry: &TraceEntry) {
        let line = match &entry.status {
            TraceStatus::Success { .. } => format!("  ✓ {} ({} ms)", entry.stage, entry.latency_ms),
            TraceStatus::Error { error } => format!("  ✗ {}: {error}", entry.stage),
            TraceStatus::Skipped { reason } => format!("  - {} skipped: {reason}", entry.stage),
            _ => return,
        };
        self.spinner.println(line);
    }
}
