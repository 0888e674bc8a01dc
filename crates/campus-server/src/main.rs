//! campus-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `CAMPUS_*` environment variables, opens the SQLite store, serves the JSON
//! API over HTTP and, when `notify_url` is set, runs the schedule poller.
//!
//! ```text
//! CAMPUS_JWT_SECRET=change-me cargo run -p campus-server
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use campus_api::{AppState, TokenSigner};
use campus_server::{
  ServerConfig,
  notify::HttpNotifier,
  poller::{SchedulePoller, SystemClock},
};
use campus_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Campus attendance and community server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the effective configuration (secret redacted) and exit.
  #[arg(long)]
  check_config: bool,
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  if cli.check_config {
    let printed = serde_json::to_string_pretty(&server_cfg.redacted())
      .context("failed to render config")?;
    println!("{printed}");
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);
  tracing::info!(path = ?store_path, "store opened");

  let cancel = CancellationToken::new();

  // The poller only runs when there is somewhere to send reminders.
  let poller = match &server_cfg.notify_url {
    Some(url) => {
      let notifier = HttpNotifier::new(url, server_cfg.notify_timeout())
        .context("failed to build notification client")?;
      tracing::info!(url = notifier.url(), "check-in reminders enabled");
      let poller = SchedulePoller::new(store.clone(), notifier, SystemClock)
        .with_matcher(server_cfg.matcher())
        .with_period(server_cfg.poll_interval())
        .with_max_catch_up(server_cfg.max_catch_up());
      Some(tokio::spawn(poller.run(cancel.child_token())))
    }
    None => {
      tracing::info!("notify_url not set; schedule poller disabled");
      None
    }
  };

  let state = AppState::new(
    store,
    TokenSigner::new(&server_cfg.jwt_secret, server_cfg.token_ttl()),
    server_cfg.geofence(),
  );
  let app = campus_api::app(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(cancel.clone()))
    .await
    .context("server error")?;

  cancel.cancel();
  if let Some(handle) = poller {
    handle.await.context("schedule poller panicked")?;
  }
  tracing::info!("shut down");

  Ok(())
}

/// Resolve on Ctrl-C, or when something else cancels `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
  tokio::select! {
    result = tokio::signal::ctrl_c() => {
      if let Err(e) = result {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
      }
      tracing::info!("shutdown requested");
      cancel.cancel();
    }
    _ = cancel.cancelled() => {}
  }
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
