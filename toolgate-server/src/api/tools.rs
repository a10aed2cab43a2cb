//! Tool listing, lookup and invocation endpoints.
//!
//! Tool listings prepend the owning server's name to produce canonical
//! names; lookups and invocations expect canonical names back. The tool
//! name travels as a query parameter on lookups because canonical names
//! may contain characters a path segment cannot.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate::dispatch::ToolInvokeResult;
use toolgate::model::ToolRecord;
use toolgate::names;
use toolgate::ToolgateError;

use crate::error::ApiError;
use crate::state::AppState;

/// Tool shape returned to admin consumers: canonical name, description,
/// and the upstream's input schema verbatim.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

fn tool_response(server_name: &str, record: &ToolRecord) -> ToolResponse {
    ToolResponse {
        name: names::merge_server_tool_names(server_name, &record.name),
        description: record.description.clone(),
        input_schema: serde_json::from_str(&record.input_schema)
            .unwrap_or_else(|_| Value::Object(Default::default())),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListToolsParams {
    /// Restrict the listing to one upstream server.
    pub server: Option<String>,
}

pub async fn list_tools(
    State(state): State<AppState>,
    Query(params): Query<ListToolsParams>,
) -> Result<Json<Vec<ToolResponse>>, ApiError> {
    let tools = match params.server.as_deref() {
        None | Some("") => state
            .store
            .list_tools()
            .await?
            .iter()
            .map(|(server_name, record)| tool_response(server_name, record))
            .collect(),
        Some(server_name) => {
            let server = state
                .store
                .get_server_by_name(server_name)
                .await?
                .ok_or_else(|| ToolgateError::NotFound(format!("mcp server '{server_name}'")))?;
            state
                .store
                .list_tools_by_server(server.id)
                .await?
                .iter()
                .map(|record| tool_response(&server.name, record))
                .collect()
        }
    };
    Ok(Json(tools))
}

#[derive(Debug, Deserialize)]
pub struct GetToolParams {
    pub name: Option<String>,
}

/// Looks up one tool by canonical name.
pub async fn get_tool(
    State(state): State<AppState>,
    Query(params): Query<GetToolParams>,
) -> Result<Json<ToolResponse>, ApiError> {
    let canonical = params
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ToolgateError::MissingField("name"))?;
    let (server_name, tool_name) = names::split_server_tool_name(canonical)
        .ok_or_else(|| ToolgateError::InvalidToolName(canonical.to_string()))?;

    let server = state
        .store
        .get_server_by_name(server_name)
        .await?
        .ok_or_else(|| ToolgateError::NotFound(format!("mcp server '{server_name}'")))?;
    let record = state
        .store
        .get_tool(server.id, tool_name)
        .await?
        .ok_or_else(|| ToolgateError::NotFound(format!("tool '{canonical}'")))?;

    Ok(Json(tool_response(&server.name, &record)))
}

/// Invokes a tool through the same pipeline as the proxy endpoint. The
/// body carries the canonical name in `name`; every other field is passed
/// to the tool as an argument.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ToolInvokeResult>, ApiError> {
    let Value::Object(mut args) = body else {
        return Err(ApiError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    };
    let name = match args.remove("name") {
        Some(Value::String(name)) => name,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "'name' field must be a string".to_string(),
            ))
        }
        None => {
            return Err(ApiError::BadRequest(
                "missing 'name' field in request body".to_string(),
            ))
        }
    };

    // the name was an input for the api, not for the tool; the remaining
    // fields are the tool arguments
    let result = state.dispatcher.invoke_tool(&name, Some(args)).await?;
    Ok(Json(result))
}
