//! Per-call resolution and forwarding of namespaced tool calls.

use rmcp::model::{CallToolResult, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ToolgateError};
use crate::model::{McpClient, Mode};
use crate::names;
use crate::store::Store;
use crate::upstream::UpstreamConnection;

/// Authenticated identity attached to a proxy request by the auth
/// middleware and carried through the MCP library's request extensions.
///
/// In dev mode `client` is `None` and no authorization is applied.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub mode: Mode,
    pub client: Option<McpClient>,
}

/// Normalized result of a tool invocation for the HTTP invoke path.
///
/// MCP content items are opaque typed variants; the admin API exposes them
/// as a homogeneous list of generic maps, each item round-tripped through
/// JSON so the wire shape is preserved without binding to the variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvokeResult {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonObject>,
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
    pub content: Vec<JsonObject>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Resolves canonical tool names to upstream connections and forwards
/// calls. One instance serves both the proxy endpoint and the admin invoke
/// endpoint; the latter skips client authorization (admin auth already
/// gates the route) by passing no [`AuthInfo`].
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
}

impl Dispatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Forwards a tool call to the upstream encoded in its canonical name
    /// and relays the response back verbatim.
    pub async fn dispatch(
        &self,
        canonical_name: &str,
        arguments: Option<JsonObject>,
        auth: Option<&AuthInfo>,
    ) -> Result<CallToolResult> {
        let (server_name, tool_name) = names::split_server_tool_name(canonical_name)
            .ok_or_else(|| ToolgateError::InvalidToolName(canonical_name.to_string()))?;

        if let Some(auth) = auth {
            if auth.mode == Mode::Prod {
                let client = auth.client.as_ref().ok_or(ToolgateError::MissingToken)?;
                if !client.has_server_access(server_name) {
                    return Err(ToolgateError::NotAllowed {
                        client: client.name.clone(),
                        server: server_name.to_string(),
                    });
                }
            }
        }

        // The server row is read after the allow-list check so that
        // authorization cannot race around a future rename.
        let server = self
            .store
            .get_server_by_name(server_name)
            .await?
            .ok_or_else(|| ToolgateError::NotFound(format!("mcp server '{server_name}'")))?;

        tracing::debug!(
            canonical = %canonical_name,
            server = %server_name,
            tool = %tool_name,
            "forwarding tool call upstream"
        );

        let conn = UpstreamConnection::connect(&server).await?;
        // the upstream sees its own local tool name, arguments untouched
        let result = conn.call_tool(tool_name, arguments).await;
        conn.close().await;
        result
    }

    /// Dispatch for the admin HTTP invoke endpoint: same pipeline, no
    /// client authorization, result normalized for JSON consumers.
    pub async fn invoke_tool(
        &self,
        canonical_name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolInvokeResult> {
        let result = self.dispatch(canonical_name, arguments, None).await?;
        Ok(normalize_result(result))
    }
}

/// Converts an MCP call result into the generic-map shape of the HTTP API.
/// Items that fail the JSON round-trip are dropped, not errors.
pub fn normalize_result(result: CallToolResult) -> ToolInvokeResult {
    let mut content = Vec::with_capacity(result.content.len());
    for item in result.content {
        match serde_json::to_value(&item) {
            Ok(Value::Object(map)) => content.push(map),
            Ok(other) => {
                tracing::warn!(kind = %value_kind(&other), "dropping non-object tool content item");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping tool content item that failed JSON round-trip");
            }
        }
    }
    let meta = result
        .meta
        .and_then(|m| match serde_json::to_value(m) {
            Ok(Value::Object(map)) if !map.is_empty() => Some(map),
            _ => None,
        });
    ToolInvokeResult {
        meta,
        is_error: result.is_error.unwrap_or(false),
        content,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
