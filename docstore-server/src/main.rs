use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::Parser;
use docstore_core::config::Config;
use docstore_core::logging::{init_logging_with_config, LogConfig};
use docstore_core::{open_backend, BackendConfig, Broker, DocumentService};
use docstore_server::{shutdown_signal, AppState, DocstoreServer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "docstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Storage backend (memory, filesystem, sqlite)
    #[arg(long)]
    backend: Option<String>,

    /// Storage root directory or database file
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// Disable the change stream
    #[arg(long)]
    no_broker: bool,

    /// Wrap stored documents with the acting user
    #[arg(long)]
    auth: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::from_env()?,
    };

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(kind) = &args.backend {
        config.storage = BackendConfig::from_kind(kind)
            .with_context(|| format!("unknown storage backend '{}'", kind))?;
    }
    if let Some(path) = &args.storage_path {
        config.storage.set_path(path.clone());
    }
    if args.no_broker {
        config.broker.enabled = false;
    }
    if args.auth {
        config.auth.enabled = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;

    info!("docstore starting");

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(config.metrics.bind_address)
            .install()
            .context("installing Prometheus exporter")?;
        info!(addr = %config.metrics.bind_address, "metrics exporter enabled");
    }
    docstore_core::metrics::init_metrics();

    info!(
        backend = config.storage.kind(),
        requirement = ?config.storage.requirement(),
        "opening storage backend"
    );
    let store = open_backend(&config.storage)
        .await
        .context("storage backend failed to initialize")?;

    let broker = config.broker.enabled.then(|| {
        info!(capacity = config.broker.queue_capacity, "broker extension enabled");
        Broker::new(config.broker.queue_capacity)
    });
    if config.auth.enabled {
        info!(header = %config.auth.user_header, "authenticated payloads enabled");
    }

    let service = Arc::new(DocumentService::new(store, broker, config.auth.enabled));
    let user_header = HeaderName::try_from(config.auth.user_header.as_str())
        .context("invalid auth user_header")?;
    let state = AppState::new(service, user_header, config.broker.keep_alive);

    let listener = TcpListener::bind(config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;

    DocstoreServer::new(state, config.server.max_body_bytes)
        .run(listener, shutdown_signal())
        .await?;

    info!("docstore stopped");
    Ok(())
}
