use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use harvest_core::browser::{
    BrowserLauncher, ChromiumSessionFactory, LaunchOverrides, LoadMoreSignal,
};
use harvest_core::{
    load_harvest_config, ConfigError, FeedKind, HarvestConfig, HarvestError, HarvestPipeline,
    HarvestReport, HarvestRequest, ProfileSummary, SessionCredential, TargetHandle,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::Harvest(err) => err.code(),
            AppError::Io(_) => "IO",
            AppError::Serialize(_) => "SERIALIZATION",
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Feed harvesting command-line interface", long_about = None)]
pub struct Cli {
    /// Path to harvest.toml
    #[arg(long, default_value = "configs/harvest.toml")]
    pub config: PathBuf,
    /// Opaque session token; guest mode when absent
    #[arg(long, env = "HARVEST_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Show the browser window instead of running headless
    #[arg(long, default_value_t = false)]
    pub headed: bool,
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover and extract items from a target's feed
    Feed(FeedArgs),
    /// Summarize a target's profile header
    Profile(ProfileArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Target handle, with or without a leading @
    pub handle: String,
    #[arg(long, value_enum, default_value_t = FeedKindArg::Posts)]
    pub kind: FeedKindArg,
    /// Number of items to collect
    #[arg(long, default_value_t = 12)]
    pub max_items: usize,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    pub handle: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate the configuration file
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedKindArg {
    Posts,
    Reels,
}

impl From<FeedKindArg> for FeedKind {
    fn from(value: FeedKindArg) -> Self {
        match value {
            FeedKindArg::Posts => FeedKind::Posts,
            FeedKindArg::Reels => FeedKind::Reels,
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_harvest_config(&cli.config)?;
    debug!(path = %cli.config.display(), "configuration loaded");

    match &cli.command {
        Commands::Config(ConfigCommands::Check) => {
            let summary = ConfigSummary::new(&cli.config, &config);
            render(&summary, cli.format)?;
        }
        Commands::Feed(args) => {
            let request = HarvestRequest::new(
                &args.handle,
                args.kind.into(),
                args.max_items,
                credential(&cli),
            )?;
            let pipeline = build_pipeline(&cli, config);
            let report = runtime()?.block_on(pipeline.run(request))?;
            info!(
                records = report.records.len(),
                succeeded = report.success_count(),
                "feed harvested"
            );
            render(&report, cli.format)?;
        }
        Commands::Profile(args) => {
            let target = TargetHandle::parse(&args.handle)?;
            let credential = credential(&cli);
            let pipeline = build_pipeline(&cli, config);
            let summary =
                runtime()?.block_on(pipeline.inspect_profile(&target, credential.as_ref()))?;
            render(&summary, cli.format)?;
        }
    }

    Ok(())
}

fn credential(cli: &Cli) -> Option<SessionCredential> {
    cli.session_token.clone().and_then(SessionCredential::new)
}

fn build_pipeline(cli: &Cli, config: HarvestConfig) -> HarvestPipeline {
    let config = Arc::new(config);
    let launcher = BrowserLauncher::new(Arc::clone(&config)).with_overrides(LaunchOverrides {
        headless: cli.headed.then_some(false),
    });
    HarvestPipeline::new(config, Arc::new(ChromiumSessionFactory::new(launcher)))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    path: PathBuf,
    base_url: String,
    headless: bool,
    user_agents: usize,
    viewports: usize,
    feeds: Vec<FeedTuningSummary>,
}

#[derive(Debug, Serialize)]
struct FeedTuningSummary {
    feed: FeedKind,
    link_pattern: String,
    stagnation_threshold: u32,
    max_attempts: u32,
    delay_ms: (u64, u64),
    load_more: LoadMoreSignal,
}

impl ConfigSummary {
    fn new(path: &Path, config: &HarvestConfig) -> Self {
        let feeds = [FeedKind::Posts, FeedKind::Reels]
            .into_iter()
            .map(|feed| {
                let tuning = config.discovery.for_kind(feed);
                FeedTuningSummary {
                    feed,
                    link_pattern: tuning.link_pattern.clone(),
                    stagnation_threshold: tuning.stagnation_threshold,
                    max_attempts: tuning.max_attempts,
                    delay_ms: (tuning.base_delay_ms, tuning.max_delay_ms),
                    load_more: tuning.load_more.clone(),
                }
            })
            .collect();
        Self {
            path: path.to_path_buf(),
            base_url: config.session.base_url.clone(),
            headless: config.chromium.headless,
            user_agents: config.user_agents.pool.len(),
            viewports: config.viewport.resolutions.len(),
            feeds,
        }
    }
}

impl DisplayFallback for ConfigSummary {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Config OK: {}", self.path.display()),
            format!("  base url: {}", self.base_url),
            format!(
                "  headless: {} | user agents: {} | viewports: {}",
                self.headless, self.user_agents, self.viewports
            ),
        ];
        for feed in &self.feeds {
            lines.push(format!(
                "  {}: pattern {} | stagnation {} | attempts {} | delay {}..{}ms",
                feed.feed,
                feed.link_pattern,
                feed.stagnation_threshold,
                feed.max_attempts,
                feed.delay_ms.0,
                feed.delay_ms.1
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for HarvestReport {
    fn display(&self) -> String {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        let mut lines = vec![
            format!(
                "@{} {} ({}) run {}",
                self.target, self.feed, self.mode, self.run_id
            ),
            format!(
                "started {} | {}ms | {} after {} attempts | {} discovered | {}/{} extracted",
                self.started_at.format("%Y-%m-%d %H:%M:%S"),
                elapsed,
                self.termination,
                self.attempts,
                self.discovered,
                self.success_count(),
                self.records.len()
            ),
        ];
        if self.records.is_empty() {
            lines.push("No items found".to_string());
        }
        for record in &self.records {
            let item = &record.item;
            let text = item
                .text
                .as_deref()
                .map(|t| truncate(t, 60))
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "  #{seq} [{status}] {key} likes={likes} comments={comments} {text}",
                seq = item.sequence_number,
                status = item.status,
                key = item.identity_key,
                likes = item.likes_raw.as_deref().unwrap_or("-"),
                comments = item.comments_raw.as_deref().unwrap_or("-"),
            ));
        }
        lines.join("\n")
    }
}

impl DisplayFallback for ProfileSummary {
    fn display(&self) -> String {
        let count = |raw: &Option<String>| raw.clone().unwrap_or_else(|| "-".to_string());
        let mut lines = vec![format!(
            "@{}{}{}",
            self.handle,
            if self.verified { " (verified)" } else { "" },
            if self.private { " [private]" } else { "" }
        )];
        if let Some(name) = &self.display_name {
            lines.push(format!("  name: {name}"));
        }
        if let Some(bio) = &self.bio {
            lines.push(format!("  bio: {}", truncate(bio, 120)));
        }
        lines.push(format!(
            "  posts: {} | followers: {} | following: {}",
            count(&self.posts_raw),
            count(&self.followers_raw),
            count(&self.following_raw)
        ));
        lines.push(format!("  url: {}", self.url));
        lines.join("\n")
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let single_line = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
