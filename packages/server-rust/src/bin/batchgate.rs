//! batchgate: priority batching proxy for a downstream classifier.
//!
//! ```bash
//! # Defaults: listen on 0.0.0.0:8000, classifier at localhost:8001/classify
//! batchgate
//!
//! # Four workers, batches of ten, JSON logs
//! CONCURRENT_WORKERS=4 BATCH_SIZE_BASE=10 batchgate --log-json
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use batchgate_server::downstream::{DownstreamConfig, HttpClassifier, DEFAULT_DOWNSTREAM_URL};
use batchgate_server::{BatcherConfig, BatchingService, NetworkConfig, NetworkModule};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Command-line and environment configuration.
#[derive(Debug, Parser)]
#[command(name = "batchgate", version, about)]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "BATCHGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port for the HTTP listener.
    #[arg(long, env = "BATCHGATE_PORT", default_value_t = 8000)]
    port: u16,

    /// Downstream classification endpoint.
    #[arg(long, env = "BATCHGATE_DOWNSTREAM_URL", default_value = DEFAULT_DOWNSTREAM_URL)]
    downstream_url: String,

    /// Per-call downstream timeout in milliseconds.
    #[arg(long, env = "BATCHGATE_DOWNSTREAM_TIMEOUT_MS", default_value_t = 30_000)]
    downstream_timeout_ms: u64,

    /// Number of batch worker loops.
    #[arg(long, env = "CONCURRENT_WORKERS", default_value_t = 3)]
    concurrent_workers: usize,

    /// Requests drawn per batch.
    #[arg(long, env = "BATCH_SIZE_BASE", default_value_t = 5)]
    batch_size_base: usize,

    /// Ceiling on any single draw.
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 20)]
    max_batch_size: usize,

    /// Idle interval with empty lanes, in milliseconds.
    #[arg(long, env = "BASE_INTERVAL_MS", default_value_t = 50)]
    base_interval_ms: u64,

    /// Upper bound on the idle interval, in milliseconds.
    #[arg(long, env = "MAX_INTERVAL_MS", default_value_t = 200)]
    max_interval_ms: u64,

    /// Base retry backoff in milliseconds; doubled per failure.
    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 100)]
    retry_backoff_ms: u64,

    /// Downstream attempts per batch.
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Payloads longer than this many characters are high priority.
    #[arg(long, env = "PRIORITY_THRESHOLD", default_value_t = 50)]
    priority_threshold: usize,

    /// Allowed CORS origins, comma separated; `*` allows any.
    #[arg(
        long,
        env = "BATCHGATE_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    cors_origins: Vec<String>,

    /// Serve Prometheus metrics on this address (disabled when unset).
    #[arg(long, env = "BATCHGATE_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "BATCHGATE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            concurrent_workers: self.concurrent_workers,
            batch_size_base: self.batch_size_base,
            max_batch_size: self.max_batch_size,
            base_interval: Duration::from_millis(self.base_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_retries: self.max_retries,
            priority_threshold: self.priority_threshold,
            ..BatcherConfig::default()
        }
    }

    fn downstream_config(&self) -> DownstreamConfig {
        DownstreamConfig {
            url: self.downstream_url.clone(),
            request_timeout: Duration::from_millis(self.downstream_timeout_ms),
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("batchgate_server=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "Prometheus metrics listener started");
    }

    let batcher_config = args.batcher_config();
    let classifier = HttpClassifier::new(&args.downstream_config())?;
    info!(
        downstream = %classifier.url(),
        workers = batcher_config.concurrent_workers,
        batch_size = batcher_config.draw_size(),
        max_retries = batcher_config.max_retries,
        "Starting batchgate v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = Arc::new(BatchingService::new(batcher_config, Arc::new(classifier))?);
    let mut module = NetworkModule::new(args.network_config(), service);
    let port = module.start().await?;
    info!(port, "Classification endpoint: POST /proxy_classify");

    module.serve(shutdown_signal()).await
}
