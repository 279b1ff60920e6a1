//! drip-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! enrollment store, serves the drip HTTP API and runs batch passes on a
//! timer.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```
//! cargo run -p drip-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use clap::Parser;
use drip_api::AppState;
use drip_engine::Sequencer;
use drip_mailer::Mailer;
use drip_render::Renderer;
use drip_server::{ServerConfig, ticker};
use drip_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Drip campaign sequencer server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Run a single batch pass, print its summary as JSON and exit.
  #[arg(long)]
  process_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = server_cfg.store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let mailer =
    Mailer::from_config(server_cfg.mail.clone()).context("failed to build mail client")?;
  let renderer = Renderer::new(&server_cfg.base_url);
  let sequence = server_cfg
    .sequence(&renderer)
    .context("invalid [campaign] configuration")?;
  tracing::info!(
    campaign = sequence.name(),
    stages = sequence.len(),
    store = ?store_path,
    "campaign loaded"
  );

  let sequencer = Arc::new(
    Sequencer::new(Arc::new(store), mailer, sequence, renderer).with_dispatch_timeout(
      Duration::from_secs(server_cfg.scheduler.dispatch_timeout_secs),
    ),
  );

  if cli.process_once {
    let summary = sequencer
      .process_due(Utc::now())
      .await
      .context("batch pass failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  if server_cfg.scheduler.enabled {
    let every = Duration::from_secs(server_cfg.scheduler.interval_secs.max(1));
    tracing::info!(interval_secs = every.as_secs(), "in-process scheduler enabled");
    tokio::spawn(ticker::run(Arc::clone(&sequencer), every));
  } else {
    tracing::info!("in-process scheduler disabled; use POST /api/drip/process");
  }

  if server_cfg.admin_password_hash.is_empty() {
    tracing::warn!("admin_password_hash is empty; admin routes will reject every request");
  }

  let state = AppState::new(sequencer, server_cfg.auth());
  let app = drip_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
