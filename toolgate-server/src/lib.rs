//! HTTP surface for the Toolgate registry.
//!
//! One axum application carries three route groups: the one-shot `/init`
//! endpoint (plus `/health`), the admin API under `/api/v0`, and the
//! unified MCP proxy endpoint at `/mcp` served through the rmcp
//! streamable-HTTP primitive. Auth middleware composes per group based on
//! the server's mode and initialization state.

pub mod api;
pub mod app;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod state;

pub use app::{run, ServerOptions};
pub use error::ApiError;
pub use state::AppState;
