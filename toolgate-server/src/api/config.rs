//! Health and one-shot initialization endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use toolgate::{Mode, ToolgateError};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// One-shot initialization. Body: `{"mode": "development" | "production"}`.
///
/// The first production-mode call creates the admin user and returns its
/// access token; the token is unrecoverable after this response. Repeat
/// calls report "already initialized" and never rotate the token.
pub async fn init_server(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mode = body
        .get("mode")
        .and_then(Value::as_str)
        .ok_or(ToolgateError::MissingField("mode"))?
        .parse::<Mode>()?;

    let outcome = state.config.init(mode).await?;
    if !outcome.created {
        return Ok(Json(json!({ "status": "already initialized" })));
    }

    match mode {
        Mode::Prod => {
            let admin = state.users.create_admin_user().await?;
            Ok(Json(json!({
                "status": "server initialized successfully",
                "mode": mode,
                "admin_access_token": admin.access_token,
            })))
        }
        Mode::Dev => Ok(Json(json!({
            "status": "server initialized successfully",
            "mode": mode,
        }))),
    }
}
