//! factreel - turn a fact into a captioned short video
//!
//! ## Commands
//!
//! - `run`: Produce one video (and optionally publish it)
//! - `config`: Print the effective configuration
//! - `check`: Probe every configured provider

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use factreel_core::domain::{JobErrorRecord, JobStatus, PipelineJob};
use factreel_core::orchestrator::{cancellation, Orchestrator, Providers};
use factreel_core::providers::Provider;
use factreel_core::store::MemoryJobStore;
use factreel_core::PipelineConfig;
use factreel_providers::{Credentials, ProvidersConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_FILE: &str = "factreel.toml";

#[derive(Parser)]
#[command(name = "factreel")]
#[command(author = "Stevedores Org")]
#[command(version = factreel_core::VERSION)]
#[command(about = "Fact-to-short-video assembly pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: ./factreel.toml when present)
    #[arg(short, long, global = true, env = "FACTREEL_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    keys: ApiKeys,

    #[command(subcommand)]
    command: Commands,
}

/// API keys, taken from flags or the environment.
#[derive(Args, Default)]
struct ApiKeys {
    #[arg(long, env = "API_NINJAS_KEY", hide_env_values = true, global = true)]
    api_ninjas_key: Option<String>,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    openrouter_api_key: Option<String>,

    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true, global = true)]
    pexels_api_key: Option<String>,

    #[arg(long, env = "PIXABAY_API_KEY", hide_env_values = true, global = true)]
    pixabay_api_key: Option<String>,
}

impl ApiKeys {
    fn credentials(&self) -> Credentials {
        Credentials {
            api_ninjas: self.api_ninjas_key.clone(),
            openrouter: self.openrouter_api_key.clone(),
            pexels: self.pexels_api_key.clone(),
            pixabay: self.pixabay_api_key.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one video from a fresh fact
    Run {
        /// Upload the rendered video
        #[arg(long)]
        publish: bool,

        /// Override the job storage root
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Probe every configured provider
    Check,
}

/// Everything a config file may contain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct AppConfig {
    #[serde(flatten)]
    pipeline: PipelineConfig,

    #[serde(default)]
    providers: ProvidersConfig,
}

impl AppConfig {
    fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("failed to parse configuration")?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load `path`, or the default file when present, or built-in defaults.
    fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// What `run` prints on stdout.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    job_id: &'a str,
    status: JobStatus,
    output: Option<String>,
    remote_id: Option<&'a str>,
    publish_error: Option<&'a str>,
    error: Option<&'a JobErrorRecord>,
}

impl<'a> RunSummary<'a> {
    fn of(job: &'a PipelineJob) -> Self {
        Self {
            job_id: job.id.as_str(),
            status: job.status,
            output: job.output().map(|p| p.display().to_string()),
            remote_id: job.artifacts.remote_id.as_deref(),
            publish_error: job.publish_error.as_deref(),
            error: job.terminal_error(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    factreel_core::telemetry::init_tracing(cli.json, level);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            publish,
            output_dir,
        } => cmd_run(config, &cli.keys.credentials(), publish, output_dir).await,
        Commands::Config => cmd_config(&config),
        Commands::Check => cmd_check(&config, &cli.keys.credentials()).await,
    }
}

async fn cmd_run(
    mut config: AppConfig,
    creds: &Credentials,
    publish: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if publish {
        config.pipeline.publish.enabled = true;
    }
    if let Some(dir) = output_dir {
        config.pipeline.job.storage_root = dir;
    }

    let providers = config.providers.build(creds)?;
    let store = Arc::new(MemoryJobStore::new());
    let orchestrator = Orchestrator::new(config.pipeline, providers, store)?;

    let (canceller, token) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current stage");
            canceller.cancel();
        }
    });

    let id = orchestrator.submit().await?;
    info!(job_id = %id, "job submitted");
    let job = orchestrator.run_with_cancel(&id, token).await?;

    println!("{}", serde_json::to_string_pretty(&RunSummary::of(&job))?);
    match job.status {
        JobStatus::Succeeded => Ok(()),
        status => {
            let reason = job
                .terminal_error()
                .map(|e| format!("{} at {}: {}", status_label(status), e.stage, e.message))
                .unwrap_or_else(|| status_label(status).to_string());
            anyhow::bail!("job {} {}", job.id, reason)
        }
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Failed => "failed",
        JobStatus::Aborted => "aborted",
    }
}

fn cmd_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

/// One probe outcome.
#[derive(Debug, Serialize)]
struct ProbeReport {
    capability: &'static str,
    provider: String,
    ok: bool,
    error: Option<String>,
}

async fn probe_all<P: Provider + ?Sized>(
    capability: &'static str,
    list: &[Arc<P>],
    reports: &mut Vec<ProbeReport>,
) {
    for provider in list {
        let result = provider.probe().await;
        reports.push(ProbeReport {
            capability,
            provider: provider.name().to_string(),
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
    }
}

async fn probe_providers(providers: &Providers) -> Vec<ProbeReport> {
    let mut reports = Vec::new();
    probe_all("facts", &providers.facts, &mut reports).await;
    probe_all("scripts", &providers.scripts, &mut reports).await;
    probe_all("narration", &providers.narrators, &mut reports).await;
    probe_all("videos", &providers.videos, &mut reports).await;
    probe_all("music", &providers.music, &mut reports).await;
    probe_all("render", &providers.renderers, &mut reports).await;
    probe_all("publish", &providers.publishers, &mut reports).await;
    reports
}

/// Capabilities a job cannot finish without.
const REQUIRED: &[&str] = &["facts", "scripts", "narration", "videos", "render"];

async fn cmd_check(config: &AppConfig, creds: &Credentials) -> Result<()> {
    let providers = config.providers.build(creds)?;
    let reports = probe_providers(&providers).await;

    for report in &reports {
        let mark = if report.ok { "ok" } else { "FAILED" };
        match &report.error {
            Some(err) => println!("{:<10} {:<12} {mark}: {err}", report.capability, report.provider),
            None => println!("{:<10} {:<12} {mark}", report.capability, report.provider),
        }
    }

    let missing: Vec<&str> = REQUIRED
        .iter()
        .copied()
        .filter(|cap| !reports.iter().any(|r| r.capability == *cap && r.ok))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("no working provider for: {}", missing.join(", "));
    }
    Ok(())
}
