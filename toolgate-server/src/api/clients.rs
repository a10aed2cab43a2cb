//! MCP-client management endpoints (production mode only; the mode gate
//! is applied by the router).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use toolgate::model::CreateClientRequest;
use toolgate::McpClient;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_clients(
    State(state): State<AppState>,
) -> Result<Json<Vec<McpClient>>, ApiError> {
    Ok(Json(state.clients.list_clients().await?))
}

/// Creates a client; the response carries its access token exactly once.
pub async fn create_client(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<McpClient>), ApiError> {
    let req: CreateClientRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
    let client = state.clients.create_client(&req).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.clients.delete_client(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
