//! Upstream server registration endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use toolgate::model::RegisterServerRequest;
use toolgate::McpServer;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

/// Registers an upstream MCP server and the tools it currently exposes.
pub async fn register_server(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<McpServer>), ApiError> {
    let req: RegisterServerRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
    validate_server_url(&req.url)?;

    let (server, _tools) = state.registry.register_server(req).await?;
    Ok((StatusCode::CREATED, Json(server)))
}

pub async fn deregister_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .deregister_server(&name)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to deregister mcp server: {e}")))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_servers(
    State(state): State<AppState>,
) -> Result<Json<Vec<McpServer>>, ApiError> {
    Ok(Json(state.store.list_servers().await?))
}

/// Only absolute http(s) URLs are accepted; streamable HTTP is the sole
/// supported transport.
fn validate_server_url(raw: &str) -> Result<(), ApiError> {
    let parsed = Url::parse(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid server url '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::BadRequest(format!(
            "invalid server url '{raw}': unsupported scheme '{other}', only http(s) is supported"
        ))),
    }
}
