//! Synchronization between the store and the proxy's exported tool set.
//!
//! The registry is the only writer of the exported set. Ordering is load
//! bearing: registration persists rows before exporting (partial
//! visibility after a crash is recovered by the startup reload), while
//! deregistration removes exports before deleting rows (so a concurrent
//! dispatch can never resolve a tool whose row is gone).

use std::collections::HashMap;
use std::sync::Arc;

use rmcp::model::Tool;
use tokio::sync::RwLock;

use crate::error::{Result, ToolgateError};
use crate::model::{McpServer, RegisterServerRequest, ToolRecord};
use crate::names;
use crate::store::Store;
use crate::upstream::UpstreamConnection;

/// The proxy's exported tool set, keyed by canonical name.
///
/// The registry holds this read-write; the proxy endpoint receives a
/// read-only clone for `list_tools` and existence checks.
#[derive(Clone, Default)]
pub struct ExportedTools {
    inner: Arc<RwLock<HashMap<String, Tool>>>,
}

impl ExportedTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, canonical_name: String, tool: Tool) {
        self.inner.write().await.insert(canonical_name, tool);
    }

    pub async fn remove(&self, canonical_name: &str) {
        self.inner.write().await.remove(canonical_name);
    }

    pub async fn contains(&self, canonical_name: &str) -> bool {
        self.inner.read().await.contains_key(canonical_name)
    }

    /// All exported tools, sorted by canonical name for stable listings.
    pub async fn snapshot(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.inner.read().await.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Keeps the exported tool set in sync with the persisted registry.
#[derive(Clone)]
pub struct ToolRegistry {
    store: Store,
    exported: ExportedTools,
}

impl ToolRegistry {
    pub fn new(store: Store, exported: ExportedTools) -> Self {
        Self { store, exported }
    }

    pub fn exported(&self) -> &ExportedTools {
        &self.exported
    }

    /// Registers an upstream server and all tools it currently exposes.
    ///
    /// The upstream must be reachable and MCP-compliant; a failed
    /// connection fails the registration. Individual tools are registered
    /// best-effort and a failing one is skipped without failing the
    /// server.
    pub async fn register_server(
        &self,
        req: RegisterServerRequest,
    ) -> Result<(McpServer, Vec<ToolRecord>)> {
        names::validate_server_name(&req.name)?;

        let probe = McpServer {
            id: 0,
            name: req.name.clone(),
            description: req.description.clone(),
            url: req.url.clone(),
            bearer_token: req.bearer_token.clone(),
        };
        let conn = UpstreamConnection::connect(&probe).await?;

        let listed = match conn.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        let mut triples = Vec::with_capacity(listed.len());
        for tool in &listed {
            let schema = match serde_json::to_string(tool.input_schema.as_ref()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(
                        server = %req.name,
                        tool = %tool.name,
                        error = %e,
                        "skipping tool with unserializable input schema"
                    );
                    continue;
                }
            };
            triples.push((
                tool.name.to_string(),
                tool.description
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                schema,
            ));
        }

        let persisted = self.store.create_server_with_tools(&req, &triples).await;
        let (server, inserted) = match persisted {
            Ok(v) => v,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        let by_name: HashMap<&str, &Tool> =
            listed.iter().map(|t| (t.name.as_ref(), t)).collect();
        for record in &inserted {
            let Some(tool) = by_name.get(record.name.as_str()) else {
                continue;
            };
            let canonical = names::merge_server_tool_names(&server.name, &record.name);
            let mut exported_tool = (*tool).clone();
            exported_tool.name = canonical.clone().into();
            self.exported.insert(canonical, exported_tool).await;
        }
        conn.close().await;

        tracing::info!(
            server = %server.name,
            url = %server.url,
            tools = inserted.len(),
            "registered MCP server"
        );
        Ok((server, inserted))
    }

    /// Deregisters a server, removing its tools from the exported set
    /// before their rows are deleted.
    pub async fn deregister_server(&self, name: &str) -> Result<()> {
        let server = self
            .store
            .get_server_by_name(name)
            .await?
            .ok_or_else(|| ToolgateError::NotFound(format!("mcp server '{name}'")))?;

        let tools = self.store.list_tools_by_server(server.id).await?;
        for tool in &tools {
            let canonical = names::merge_server_tool_names(&server.name, &tool.name);
            self.exported.remove(&canonical).await;
        }
        self.store.delete_server_and_tools(server.id).await?;

        tracing::info!(server = %name, tools = tools.len(), "deregistered MCP server");
        Ok(())
    }

    /// Rebuilds the exported set from the store at boot. No upstream
    /// connection is opened; tool rows whose stored schema no longer
    /// parses are skipped with a warning.
    pub async fn reload_on_startup(&self) -> Result<()> {
        let tools = self.store.list_tools().await?;
        let mut loaded = 0usize;
        for (server_name, record) in tools {
            match record_to_tool(&server_name, &record) {
                Some(tool) => {
                    self.exported.insert(tool.name.to_string(), tool).await;
                    loaded += 1;
                }
                None => {
                    tracing::warn!(
                        server = %server_name,
                        tool = %record.name,
                        "skipping stored tool with unparseable input schema"
                    );
                }
            }
        }
        tracing::info!(tools = loaded, "loaded exported tool set from store");
        Ok(())
    }
}

/// Builds the exported rmcp tool for a stored record, named canonically.
fn record_to_tool(server_name: &str, record: &ToolRecord) -> Option<Tool> {
    let schema: rmcp::model::JsonObject = serde_json::from_str(&record.input_schema).ok()?;
    let canonical = names::merge_server_tool_names(server_name, &record.name);
    let mut tool = Tool::default();
    tool.name = canonical.into();
    tool.description = if record.description.is_empty() {
        None
    } else {
        Some(record.description.clone().into())
    };
    tool.input_schema = Arc::new(schema);
    Some(tool)
}
