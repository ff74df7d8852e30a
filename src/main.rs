use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use omniprobe::config::HarnessConfig;
use omniprobe::orchestrator::RunState;
use omniprobe::probes::{HttpProber, Probe};

#[derive(Parser)]
#[command(
    name = "omniprobe",
    about = "Load testing and health monitoring for HTTP service stacks",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (default: $OMNIPROBE_CONFIG, then ./omniprobe.toml)
    #[arg(long, short, global = true, env = "OMNIPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full orchestrated run: prerequisites, readiness, load phases, report
    Run(RunArgs),

    /// Only poll service health and host resources, then print availability
    Monitor {
        /// How long to monitor, in seconds
        #[arg(long, default_value = "60")]
        duration: u64,
    },

    /// One probe per configured URL plus a small concurrent sample
    Quick {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

/// Overrides for values otherwise taken from the config file.
#[derive(Args)]
struct RunArgs {
    /// Middleware base URL
    #[arg(long, env = "OMNIPROBE_BASE_URL")]
    base_url: Option<String>,

    /// Backend base URL
    #[arg(long, env = "OMNIPROBE_BACKEND_URL")]
    backend_url: Option<String>,

    #[arg(long)]
    concurrent_users: Option<usize>,

    #[arg(long)]
    requests_per_user: Option<usize>,

    /// Sustained load window, in seconds
    #[arg(long)]
    sustained_duration: Option<f64>,

    /// Seconds between health poll cycles
    #[arg(long)]
    health_poll_interval: Option<f64>,

    /// Where to write the JSON report
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, config: &mut HarnessConfig) {
        if let Some(v) = self.base_url {
            config.base_url = v;
        }
        if let Some(v) = self.backend_url {
            config.backend_url = v;
        }
        if let Some(v) = self.concurrent_users {
            config.concurrent_users = v;
        }
        if let Some(v) = self.requests_per_user {
            config.requests_per_user = v;
        }
        if let Some(v) = self.sustained_duration {
            config.sustained_duration = v;
        }
        if let Some(v) = self.health_poll_interval {
            config.health_poll_interval = v;
        }
        if let Some(v) = self.report {
            config.report_path = v;
        }
    }
}

fn init_tracing(config: &HarnessConfig, force_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if force_json || config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::load_or_default()?,
    };
    init_tracing(&config, cli.log_json);

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            let report = omniprobe::run(config).await?;
            if report.run.state == RunState::Failed {
                eprintln!(
                    "Run failed: {}",
                    report.run.failure.as_deref().unwrap_or("unknown failure")
                );
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", report.format_summary());
        }
        Commands::Monitor { duration } => {
            tracing::info!(duration_secs = duration, "Starting monitors");
            let report = omniprobe::watch(&config, Duration::from_secs(duration)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Quick { json } => {
            let probe: Arc<dyn Probe> = Arc::new(HttpProber::new()?);
            let report = omniprobe::quick(&config, probe.as_ref()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nOmniprobe Quick Check");
                println!("{:<28} | {:<6} | {:>10} | Details", "Check", "Status", "Latency");
                println!("{:-<28}-|-{:-<6}-|-{:->10}-|-{:-<30}", "", "", "", "");
                for c in &report.checks {
                    let status = if c.success { "PASS" } else { "FAIL" };
                    let details = match &c.error {
                        Some(e) => e.clone(),
                        None => format!("HTTP {}", c.status_code),
                    };
                    println!("{:<28} | {:<6} | {:>8.1}ms | {}", c.name, status, c.latency_ms, details);
                }
                let b = &report.batch;
                println!(
                    "\nConcurrent sample {}: {}/{} ok, avg {}",
                    b.endpoint,
                    b.successes,
                    b.total,
                    b.avg_latency_ms
                        .map_or_else(|| "n/a".to_string(), |v| format!("{:.1}ms", v))
                );
                println!("Passed {}/{} checks\n", report.passed(), report.checks.len());
            }
            if report.passed() < report.checks.len() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
