//! catchup server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite presence log, connects to the message archive, and serves the
//! catchup API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use catchup_archive_es::EsArchive;
use catchup_core::link::HistoryLinks;
use catchup_engine::Engine;
use catchup_server::{WebhookTransport, environment, load_config};
use catchup_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Missed-message notifier for chat channels")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let server_cfg = load_config(config::File::from(cli.config).required(false), environment())
    .context("failed to load configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let archive = EsArchive::new(
    &server_cfg.archive_hosts,
    &server_cfg.archive_index,
    &server_cfg.archive_doctype,
    server_cfg.engine.archive_request_timeout(),
  )
  .context("failed to build archive client")?;

  let transport = WebhookTransport::new(&server_cfg.transport_url, Duration::from_secs(30))
    .context("failed to build webhook transport")?;

  let links = HistoryLinks::new(&server_cfg.history_base_url)
    .with_context(|| format!("invalid history_base_url {:?}", server_cfg.history_base_url))?;

  let engine = Arc::new(Engine::new(
    server_cfg.engine.clone(),
    store,
    archive,
    transport,
    Arc::new(links),
  ));

  let app = catchup_api::api_router(engine);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
