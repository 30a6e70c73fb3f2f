//! Collect command implementation

use crate::collector::{CollectError, Collector, ProgressSink};
use crate::config::{
    AppCredentials, CollectorConfig, DEFAULT_ORDER_BY, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    MAX_WINDOWS_TO_COLLECT,
};
use crate::fetcher::http::DEFAULT_BASE_URL;
use crate::fetcher::{FeishuHttpClient, TenantTokenProvider};
use crate::output::CsvRecordSink;
use crate::scheduler::config::{DEFAULT_POOL_SIZE, DEFAULT_RATE_LIMIT_PER_SECOND, MAX_RETRIES};
use crate::shutdown::SharedShutdown;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::CliError;

/// Progress bar resolution
const PROGRESS_STEPS: u64 = 1000;

/// Usage Report Collector CLI
#[derive(Parser, Debug)]
#[command(name = "usage-report-collector")]
#[command(about = "Collect daily meeting usage reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect the top-user report for each of the last N days
    Collect(CollectArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}. Valid options: json, human")),
        }
    }
}

/// Collect command arguments
#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Number of days to collect, counting back from yesterday
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOWS_TO_COLLECT))]
    pub days: i64,

    /// Directory receiving one CSV file per day
    #[arg(long, default_value = "reports")]
    pub output_dir: PathBuf,

    /// Number of concurrent workers
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub workers: usize,

    /// Outbound requests allowed per second across all workers
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_PER_SECOND)]
    pub rate_limit_per_second: usize,

    /// Report entries requested per day
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
    pub page_size: u32,

    /// Report sort order code
    #[arg(long, default_value_t = DEFAULT_ORDER_BY)]
    pub order_by: u8,

    /// Maximum number of retries for failed requests
    #[arg(long, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Application id
    #[arg(long, env = "FEISHU_APP_ID")]
    pub app_id: String,

    /// Application secret
    #[arg(long, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,

    /// Open platform base URL
    #[arg(long, env = "FEISHU_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

impl CollectArgs {
    /// Run configuration described by these arguments
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::new(self.days)
            .with_pool_size(self.workers)
            .with_rate_limit_per_second(self.rate_limit_per_second)
            .with_page_size(self.page_size)
            .with_order_by(self.order_by)
    }

    /// Execute the collect command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.collector_config();
        config.validate()?;
        let credentials = AppCredentials::new(&self.app_id, &self.app_secret)?;

        let http = FeishuHttpClient::new(&self.base_url).with_max_retries(self.max_retries);
        let sink = Arc::new(CsvRecordSink::new(&self.output_dir));
        let collector = Collector::new(
            Arc::new(TenantTokenProvider::new(http.clone(), credentials)),
            Arc::new(http),
            sink.clone(),
        );

        info!(
            days = self.days,
            output_dir = %self.output_dir.display(),
            "Starting collection"
        );

        let progress = BarProgress::new(cli.output_format == OutputFormat::Human);
        let result = collector.execute(&config, &progress, shutdown).await;
        progress.finish(&result);
        result?;

        let files = sink.files()?;
        match cli.output_format {
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "status": "ok",
                    "days": self.days,
                    "output_dir": self.output_dir.display().to_string(),
                    "files": files
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>(),
                });
                println!("{summary}");
            }
            OutputFormat::Human => {
                println!(
                    "Collected {} day(s) into {} ({} file(s))",
                    self.days,
                    self.output_dir.display(),
                    files.len()
                );
            }
        }
        Ok(())
    }
}

/// Renders progress values on a terminal bar
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(PROGRESS_STEPS)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message("Collecting usage reports");
        Self { bar }
    }

    fn finish(&self, result: &Result<(), CollectError>) {
        match result {
            Ok(()) => self.bar.finish_with_message("Done"),
            Err(CollectError::Cancelled) => self.bar.abandon_with_message("Cancelled"),
            Err(_) => self.bar.abandon_with_message("Failed"),
        }
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, progress: f32) {
        self.bar
            .set_position((progress.clamp(0.0, 1.0) * PROGRESS_STEPS as f32).round() as u64);
    }
}
