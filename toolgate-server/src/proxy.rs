//! The unified MCP endpoint exposed to downstream clients.
//!
//! The handler serves the proxy's exported tool set and forwards every
//! tool call through the dispatcher. The auth middleware has already run
//! by the time the rmcp service invokes the handler; the authenticated
//! identity travels in the original request's extensions, which rmcp
//! forwards as `http::request::Parts` on the request context.

use std::sync::Arc;

use http::request::Parts;
use rmcp::model::{
    CallToolRequestMethod, CallToolRequestParam, CallToolResult, ErrorCode, Implementation,
    ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::StreamableHttpService;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use toolgate::dispatch::AuthInfo;
use toolgate::registry::ExportedTools;
use toolgate::{Dispatcher, ToolgateError};

/// MCP server handler backing the `/mcp` endpoint.
///
/// Holds a read-only view of the exported tool set; the registry is the
/// only writer. Handlers close over the dispatcher, never the registry.
#[derive(Clone)]
pub struct ProxyHandler {
    exported: ExportedTools,
    dispatcher: Dispatcher,
}

impl ProxyHandler {
    pub fn new(exported: ExportedTools, dispatcher: Dispatcher) -> Self {
        Self {
            exported,
            dispatcher,
        }
    }

    fn auth_info(context: &RequestContext<RoleServer>) -> Option<AuthInfo> {
        context
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.extensions.get::<AuthInfo>())
            .cloned()
    }
}

impl ServerHandler for ProxyHandler {
    fn get_info(&self) -> ServerInfo {
        let mut capabilities = ServerCapabilities::default();
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });

        let server_info =
            Implementation::new("toolgate-proxy", env!("CARGO_PKG_VERSION"))
                .with_title("Toolgate Proxy MCP Server");

        let mut info = ServerInfo::new(capabilities);
        info.protocol_version = ProtocolVersion::default();
        info.server_info = server_info;
        info.instructions = Some(
            "Aggregating MCP proxy. Tools are exported as <server>__<tool> and \
             forwarded to the upstream server that provides them."
                .into(),
        );
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(
            self.exported.snapshot().await,
        ))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // Unknown names fail here, at the proxy layer. During a
        // deregistration the exported entry disappears before the rows do,
        // so a racing call gets tool-not-found rather than a dangling
        // store lookup.
        if !self.exported.contains(&request.name).await {
            tracing::debug!(tool = %request.name, "call for tool not in exported set");
            return Err(McpError::method_not_found::<CallToolRequestMethod>());
        }

        let auth = Self::auth_info(&context);
        self.dispatcher
            .dispatch(&request.name, request.arguments, auth.as_ref())
            .await
            .map_err(to_mcp_error)
    }
}

/// Maps core dispatch errors onto JSON-RPC error codes.
fn to_mcp_error(err: ToolgateError) -> McpError {
    match &err {
        ToolgateError::InvalidToolName(_) => McpError::invalid_params(err.to_string(), None),
        ToolgateError::NotAllowed { .. } => {
            McpError::new(ErrorCode::INVALID_REQUEST, err.to_string(), None)
        }
        _ => McpError::internal_error(err.to_string(), None),
    }
}

/// Builds the streamable-HTTP service for the handler, ready to be nested
/// at the proxy path.
pub fn proxy_service(
    handler: ProxyHandler,
) -> StreamableHttpService<ProxyHandler, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(handler.clone()),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    )
}
