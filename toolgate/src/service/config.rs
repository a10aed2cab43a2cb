//! One-shot mode initialization and config reads.

use crate::error::Result;
use crate::model::{Mode, ServerConfig};
use crate::store::Store;

/// Result of an init attempt.
#[derive(Debug, Clone, Copy)]
pub struct InitOutcome {
    /// False when the server was already initialized; the stored mode is
    /// left untouched in that case.
    pub created: bool,
    /// The mode now in effect.
    pub mode: Mode,
}

/// Reads and initializes the singleton server configuration.
#[derive(Clone)]
pub struct ConfigService {
    store: Store,
}

impl ConfigService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns the stored configuration, or the uninitialized default when
    /// no row exists yet.
    pub async fn get_config(&self) -> Result<ServerConfig> {
        Ok(self.store.get_server_config().await?.unwrap_or_default())
    }

    /// Initializes the server in the given mode. Idempotent: a repeat call
    /// reports `created: false` and does not modify the stored mode.
    pub async fn init(&self, mode: Mode) -> Result<InitOutcome> {
        if let Some(existing) = self.store.get_server_config().await? {
            if existing.initialized {
                return Ok(InitOutcome {
                    created: false,
                    mode: existing.mode,
                });
            }
        }
        let config = ServerConfig {
            mode,
            initialized: true,
        };
        self.store.insert_server_config(&config).await?;
        tracing::info!(mode = %mode, "server initialized");
        Ok(InitOutcome {
            created: true,
            mode,
        })
    }
}
