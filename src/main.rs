//! inference-guard operations CLI.
//!
//! ```text
//! inference-guard check    --config guard.toml   validate and print effective config
//! inference-guard schedule [--config guard.toml] print the retry delay schedule
//! inference-guard simulate [--config guard.toml] drive simulated traffic through the guard
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::task::JoinSet;

use inference_guard::client::{ChatMessage, ChatRequest, InferenceClient, SimulatedTransport};
use inference_guard::config::{load_config, ConfigError, ConfigWatcher, GuardConfig};
use inference_guard::observability::{logging, metrics};
use inference_guard::resilience::{ErrorKind, RetryPolicy};

#[derive(Parser)]
#[command(name = "inference-guard")]
#[command(about = "Operate and drill the inference reliability layer", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the effective settings
    Check,
    /// Print the backoff delay after every attempt
    Schedule,
    /// Drive simulated traffic through the guard and print its status
    Simulate {
        /// Total calls to make
        #[arg(long, default_value_t = 100)]
        calls: u32,

        /// Concurrent callers sharing the guard
        #[arg(long, default_value_t = 4)]
        concurrency: u32,

        /// Share of downstream attempts that fail (0.0 - 1.0)
        #[arg(long, default_value_t = 0.2)]
        failure_rate: f64,

        /// Simulated downstream latency per attempt
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,

        /// Reload the config file while the drill runs
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(ConfigError::Validation(errors)) => {
                eprintln!("{} is invalid:", path.display());
                for error in errors {
                    eprintln!("  - {error}");
                }
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
        None => GuardConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            if cli.config.is_none() {
                eprintln!("check needs --config <path>");
                std::process::exit(2);
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Schedule => print_schedule(&RetryPolicy::from(&config.retries)),
        Commands::Simulate {
            calls,
            concurrency,
            failure_rate,
            latency_ms,
            watch,
        } => {
            logging::init_logging(&config.observability)?;
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let transport =
                SimulatedTransport::new(failure_rate).with_latency(Duration::from_millis(latency_ms));
            let client = Arc::new(InferenceClient::new(transport, &config));

            let _watcher = match (&cli.config, watch) {
                (Some(path), true) => {
                    let (watcher, mut updates) = ConfigWatcher::start(path, config.clone())?;
                    let client = client.clone();
                    tokio::spawn(async move {
                        while let Some(update) = updates.recv().await {
                            client.apply_config(&update);
                        }
                    });
                    Some(watcher)
                }
                (None, true) => {
                    tracing::warn!("--watch ignored without --config");
                    None
                }
                _ => None,
            };

            let outcomes = run_drill(client.clone(), calls, concurrency).await?;
            let report = serde_json::json!({
                "status": client.status(),
                "outcomes": outcomes,
                "transport_requests": client.transport().sent(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn print_schedule(policy: &RetryPolicy) {
    println!("max attempts: {}", policy.max_attempts());
    for (attempt, delay) in policy.schedule().iter().enumerate() {
        println!("attempt {}: retry after {:?}", attempt + 1, delay);
    }
    println!("attempt {}: final", policy.max_attempts());
}

/// Spread `calls` over `concurrency` tasks; Ctrl+C stops early.
async fn run_drill(
    client: Arc<InferenceClient<SimulatedTransport>>,
    calls: u32,
    concurrency: u32,
) -> Result<BTreeMap<&'static str, u32>, Box<dyn std::error::Error>> {
    let next = Arc::new(AtomicU32::new(0));
    let mut tasks = JoinSet::new();

    for _ in 0..concurrency.max(1) {
        let client = client.clone();
        let next = next.clone();
        tasks.spawn(async move {
            let mut outcomes: BTreeMap<&'static str, u32> = BTreeMap::new();
            loop {
                let n = next.fetch_add(1, Ordering::Relaxed);
                if n >= calls {
                    break;
                }
                let request = ChatRequest::new(vec![ChatMessage::user(format!("drill call {n}"))]);
                let result = client.chat_completion(request).await;
                let outcome = result.error_kind.map_or("success", ErrorKind::as_str);
                *outcomes.entry(outcome).or_default() += 1;
            }
            outcomes
        });
    }

    let mut totals = BTreeMap::new();
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(outcomes) => {
                    for (outcome, count) in outcomes? {
                        *totals.entry(outcome).or_default() += count;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, stopping drill");
                tasks.abort_all();
                break;
            }
        }
    }
    Ok(totals)
}
