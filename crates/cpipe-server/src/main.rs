//! cpipe-server: binaire HTTP
//!
//! ```text
//! cpipe-server [--config cpipe.toml] [--bind 127.0.0.1:8080] [--data-dir tmp]
//!              [--static-dir public] [--seed 42]
//! ```
//!
//! Journalisation via `RUST_LOG` (défaut : `info` pour les crates `cpipe_*`
//! servis et `tower_http`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cpipe_server::config::Overrides;
use cpipe_server::{router, AppState, ServerConfig};
use cpipe_session::{FsStore, MemoryStore, SessionStore, Sessions};
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "cpipe-server", version, about = "HTTP front end for the cpipe compiler pipeline demo")]
struct Cli {
    /// Configuration file (otherwise cpipe.toml is searched upward)
    #[arg(long, env = "CPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// TCP address to bind
    #[arg(long, env = "CPIPE_BIND")]
    bind: Option<SocketAddr>,

    /// Session directory (in-memory store when unset)
    #[arg(long, env = "CPIPE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory containing frontend assets
    #[arg(long, env = "CPIPE_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Seed for simulated stage durations
    #[arg(long, env = "CPIPE_SEED")]
    seed: Option<u64>,
}

/// Cibles `tracing` = chemins de module ; un nom de crate inexistant ne filtre rien.
const DEFAULT_FILTER: &str = "cpipe_server=info,cpipe_session=info,cpipe_step=info,cpipe_tools=info,tower_http=info";

fn init_telemetry() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_state(cfg: &ServerConfig) -> Result<AppState> {
    let store: Arc<dyn SessionStore> = match &cfg.data_dir {
        Some(dir) => Arc::new(FsStore::open(dir).with_context(|| format!("opening data dir {}", dir.display()))?),
        None => Arc::new(MemoryStore::default()),
    };
    tracing::info!(backend = store.backend(), seed = ?cfg.seed, "session store ready");
    Ok(AppState::new(Sessions::new(store, cfg.seed)))
}

async fn real_main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("current directory")?;
    let cfg = ServerConfig::load(cli.config.as_deref(), &cwd)?.with_overrides(Overrides {
        bind: cli.bind,
        data_dir: cli.data_dir,
        static_dir: cli.static_dir,
        seed: cli.seed,
    });

    let state = build_state(&cfg)?;
    if let Some(dir) = &cfg.static_dir {
        tracing::info!("Serving static files from: {}", dir.display());
    }
    let app = router(state, cfg.static_dir.clone());

    let listener = TcpListener::bind(cfg.bind).await.with_context(|| format!("binding {}", cfg.bind))?;
    tracing::info!("cpipe server: http://{}", cfg.bind);
    axum::serve(listener, app).await.context("server error")
}

#[tokio::main]
async fn main() -> ExitCode {
    init_telemetry();
    match real_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_names_real_targets() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        let this = module_path!().split("::").next().unwrap_or_default();
        let targets: Vec<&str> = DEFAULT_FILTER.split(',').filter_map(|d| d.split('=').next()).collect();
        assert!(targets.contains(&this), "{targets:?}");
        for t in targets {
            assert!(t == "tower_http" || t.starts_with("cpipe_"), "{t}");
        }
    }
}
