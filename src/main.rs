use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use formgate::config::{FormgateConfig, LoggingConfig};
use formgate::headers::rate_limit_headers;
use formgate::ratelimit::{
    spawn_sweeper, Clock, Policies, PolicyName, RateLimitResult, SystemClock,
};

/// Replay identifiers from stdin through a rate limit policy.
///
/// Each input line is one identifier; each output line is a JSON decision
/// with the response headers a handler would send.
#[derive(Parser, Debug)]
#[command(name = "formgate", version, about)]
struct Cli {
    /// YAML configuration file (FORMGATE__* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy to apply: contact or strict
    #[arg(short, long, default_value = "contact")]
    policy: PolicyName,

    /// Requests admitted per identifier per window
    #[arg(short, long, default_value_t = 3)]
    limit: u32,

    /// Log filter, overrides the configured level
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct Decision<'a> {
    identifier: &'a str,
    policy: &'static str,
    #[serde(flatten)]
    result: RateLimitResult,
    headers: BTreeMap<&'static str, String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = FormgateConfig::load(cli.config.as_deref())?;
    setup_logging(&config.logging, cli.log_level.as_deref());

    info!("Starting Formgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let policies = Policies::from_config(&config.policies, clock.clone())?;

    let sweeper = if config.sweeper.enabled {
        Some(spawn_sweeper(
            policies.all(),
            Duration::from_secs(config.sweeper.interval_secs),
        ))
    } else {
        None
    };

    let limiter = policies.get(cli.policy).clone();
    info!(policy = %cli.policy, limit = cli.limit, "Reading identifiers from stdin");

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdout = tokio::io::stdout();
    let (mut admitted, mut rejected) = (0u64, 0u64);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next() => line,
        };

        let Some(line) = line else { break };
        let line = line?;
        let identifier = line.trim();
        if identifier.is_empty() {
            continue;
        }

        let result = limiter.check_and_increment(identifier, cli.limit);
        if result.success {
            admitted += 1;
        } else {
            rejected += 1;
        }

        let decision = Decision {
            identifier,
            policy: cli.policy.as_str(),
            result,
            headers: rate_limit_headers(&result, clock.now_ms()).into_iter().collect(),
        };
        let mut out = serde_json::to_string(&decision)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
    }
    stdout.flush().await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }

    info!(
        admitted = admitted,
        rejected = rejected,
        tracked = limiter.tracked_identifiers(),
        "Formgate stopped"
    );
    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over both the flag and
/// the configured level. Logs go to stderr so stdout stays machine-readable.
fn setup_logging(config: &LoggingConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => subscriber.json().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.pretty().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
