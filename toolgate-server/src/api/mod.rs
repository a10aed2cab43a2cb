//! Admin HTTP API and route assembly.

pub mod clients;
pub mod config;
pub mod servers;
pub mod tools;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::{
    require_api_auth, require_initialized, require_prod_mode, require_proxy_auth,
};
use crate::proxy::{proxy_service, ProxyHandler};
use crate::state::AppState;

/// Path prefix for the versioned admin API.
pub const V0_PATH_PREFIX: &str = "/api/v0";

/// Assembles the full application router: `/init` and `/health` ungated,
/// the admin API under `/api/v0`, and the MCP proxy at `/mcp`.
pub fn router(state: AppState) -> Router {
    // layers run outermost-last: the initialization gate is applied last
    // so it runs before auth on every gated group
    let admin = Router::new()
        .route("/servers", post(servers::register_server).get(servers::list_servers))
        .route("/servers/:name", delete(servers::deregister_server))
        .route("/tools", get(tools::list_tools))
        .route("/tool", get(tools::get_tool))
        .route("/tools/invoke", post(tools::invoke_tool))
        .layer(from_fn_with_state(state.clone(), require_api_auth))
        .layer(from_fn_with_state(state.clone(), require_initialized));

    // client management exists only in production mode
    let client_admin = Router::new()
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route("/clients/:name", delete(clients::delete_client))
        .layer(from_fn_with_state(state.clone(), require_prod_mode))
        .layer(from_fn_with_state(state.clone(), require_api_auth))
        .layer(from_fn_with_state(state.clone(), require_initialized));

    let handler = ProxyHandler::new(state.exported().clone(), state.dispatcher.clone());
    let mcp = Router::new()
        .nest_service("/mcp", proxy_service(handler))
        .layer(from_fn_with_state(state.clone(), require_proxy_auth))
        .layer(from_fn_with_state(state.clone(), require_initialized));

    Router::new()
        .route("/health", get(config::health))
        .route("/init", post(config::init_server))
        .nest(V0_PATH_PREFIX, admin.merge(client_admin))
        .merge(mcp)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
