//! registrar-server binary.
//!
//! Loads [`ServerConfig`] from `--config` plus `REGISTRAR_*` overrides, opens
//! the SQLite store and serves the API. `--hash-password` prints an argon2
//! PHC string for a password read from stdin instead.

use std::{io, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use registrar_server::{AppState, ServerConfig, auth};
use registrar_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "University course registration server")]
struct Cli {
  /// TOML configuration file; missing is fine if the environment covers it.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash one line from stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();

  if cli.hash_password {
    eprintln!("Password:");
    let line = io::stdin().lines().next().context("no password on stdin")??;
    let phc = auth::hash_password(&line).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{phc}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("loading {}", cli.config.display()))?;
  let store_path = cfg.resolved_store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("opening store {}", store_path.display()))?;

  let address = format!("{}:{}", cfg.host, cfg.port);
  let listener = tokio::net::TcpListener::bind(&address)
    .await
    .with_context(|| format!("binding {address}"))?;
  tracing::info!(
    %address,
    store = %store_path.display(),
    check_time_conflicts = cfg.check_time_conflicts,
    "registrar listening"
  );

  let app = registrar_server::router(AppState::new(Arc::new(store), &cfg));
  axum::serve(listener, app).await?;
  Ok(())
}
