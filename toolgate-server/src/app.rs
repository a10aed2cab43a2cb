//! Server bootstrap: store connection, mode protocol, registry reload,
//! and the listening loop.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use toolgate::{Mode, Result, Store, ToolgateError};

use crate::api;
use crate::state::AppState;

/// Resolved startup configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Port to listen on.
    pub port: u16,
    /// Storage DSN; `None` falls back to the embedded file store.
    pub database_url: Option<String>,
    /// Mode requested via flag or environment.
    pub desired_mode: Mode,
}

/// Opens the store (running migrations) and wires up the services.
/// Failures here are fatal.
pub fn build_state(database_url: Option<&str>) -> Result<AppState> {
    let store = Store::open(database_url)?;
    Ok(AppState::new(store))
}

/// Enforces the mode-at-startup protocol.
///
/// An initialized store freezes the mode: starting with a different one
/// aborts. An uninitialized store is silently initialized in dev mode;
/// in prod mode the server starts anyway and every route except `/init`
/// is refused until initialization.
pub async fn ensure_startup_mode(state: &AppState, desired: Mode) -> Result<()> {
    let config = state.config.get_config().await?;
    if config.initialized {
        if config.mode != desired {
            return Err(ToolgateError::ModeMismatch {
                stored: config.mode,
                desired,
            });
        }
        tracing::info!(mode = %config.mode, "server already initialized");
        return Ok(());
    }
    match desired {
        Mode::Dev => {
            state.config.init(Mode::Dev).await?;
        }
        Mode::Prod => {
            tracing::info!(
                "starting uninitialized in production mode; all routes except /init are refused \
                 until the server is initialized"
            );
        }
    }
    Ok(())
}

/// Starts the registry server (blocking call).
pub async fn run(opts: ServerOptions) -> anyhow::Result<()> {
    let state =
        build_state(opts.database_url.as_deref()).context("failed to open registry store")?;
    ensure_startup_mode(&state, opts.desired_mode).await?;
    state
        .registry
        .reload_on_startup()
        .await
        .context("failed to load exported tools from store")?;

    let router = api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "toolgate registry listening");

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
