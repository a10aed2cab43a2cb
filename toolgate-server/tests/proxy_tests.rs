//! End-to-end tests driving the proxy over real streamable-HTTP: an
//! in-process upstream MCP server is registered, its tools are re-exported
//! under canonical names, and calls are forwarded with the name rewritten
//! to the upstream-local one.

use std::sync::Arc;

use axum::Router;
use http::request::Parts;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientCapabilities, Content, Implementation,
    InitializeRequestParam, JsonObject, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::{serve_client, RequestContext, RoleClient, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{StreamableHttpClientTransport, StreamableHttpService};
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use toolgate::{Mode, Store};
use toolgate_server::{api, AppState};

#[derive(Debug, Clone)]
struct RecordedCall {
    name: String,
    arguments: Option<JsonObject>,
    authorization: Option<String>,
}

/// Minimal upstream MCP server that records every tool call it receives.
#[derive(Clone)]
struct FixtureUpstream {
    tools: Vec<Tool>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FixtureUpstream {
    fn github() -> Self {
        Self::with_tools(vec![
            fixture_tool(
                "git_commit",
                "Create a git commit",
                json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"],
                }),
            ),
            fixture_tool("create_pr", "Open a pull request", json!({ "type": "object" })),
        ])
    }

    fn with_tools(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn fixture_tool(name: &str, description: &str, schema: Value) -> Tool {
    let Value::Object(schema) = schema else {
        panic!("fixture schema must be an object");
    };
    let mut tool = Tool::default();
    tool.name = name.to_string().into();
    tool.description = Some(description.to_string().into());
    tool.input_schema = Arc::new(schema);
    tool
}

impl ServerHandler for FixtureUpstream {
    fn get_info(&self) -> ServerInfo {
        let mut capabilities = ServerCapabilities::default();
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });

        let mut info = ServerInfo::new(capabilities);
        info.protocol_version = ProtocolVersion::default();
        info.server_info = Implementation::new("fixture-upstream", "0.0.1");
        info.instructions = None;
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools.clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let authorization = context
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.headers.get(http::header::AUTHORIZATION))
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        self.calls.lock().await.push(RecordedCall {
            name: request.name.to_string(),
            arguments: request.arguments.clone(),
            authorization,
        });
        Ok(CallToolResult {
            content: vec![Content::text(format!("done: {}", request.name))],
            structured_content: None,
            is_error: None,
            meta: None,
        })
    }
}

async fn serve_router(router: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), handle)
}

async fn start_upstream(fixture: FixtureUpstream) -> (String, tokio::task::JoinHandle<()>) {
    let service = StreamableHttpService::new(
        move || Ok(fixture.clone()),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    );
    let router = Router::new().nest_service("/mcp", service);
    let (base, handle) = serve_router(router).await;
    (format!("{base}/mcp"), handle)
}

async fn start_toolgate(state: &AppState) -> (String, tokio::task::JoinHandle<()>) {
    serve_router(api::router(state.clone())).await
}

async fn connect_client(
    url: &str,
    auth_header: Option<String>,
) -> Result<RunningService<RoleClient, InitializeRequestParam>, String> {
    let mut transport_config = StreamableHttpClientTransportConfig::with_uri(url.to_string());
    transport_config.auth_header = auth_header;
    let transport =
        StreamableHttpClientTransport::with_client(reqwest::Client::default(), transport_config);
    let client_info = InitializeRequestParam::new(
        ClientCapabilities::default(),
        Implementation::new("toolgate test client", "0.0.1"),
    );
    serve_client(client_info, transport)
        .await
        .map_err(|e| e.to_string())
}

fn arguments(value: Value) -> Option<JsonObject> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

async fn register_server(
    http: &reqwest::Client,
    base: &str,
    admin_token: Option<&str>,
    body: Value,
) {
    let mut request = http.post(format!("{base}/api/v0/servers")).json(&body);
    if let Some(token) = admin_token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.unwrap();
    assert_eq!(response.status(), 201, "{}", response.text().await.unwrap());
}

#[test_log::test(tokio::test)]
async fn test_namespacing_and_dispatch_rewrite() {
    let fixture = FixtureUpstream::github();
    let (upstream_url, _upstream) = start_upstream(fixture.clone()).await;

    let state = AppState::new(Store::open_in_memory().unwrap());
    state.config.init(Mode::Dev).await.unwrap();
    let (base, _server) = start_toolgate(&state).await;
    let http = reqwest::Client::new();

    register_server(
        &http,
        &base,
        None,
        json!({ "name": "github", "description": "GitHub tools", "url": upstream_url }),
    )
    .await;

    // admin listing shows canonical names and the original schema
    let tools: Value = http
        .get(format!("{base}/api/v0/tools"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["github__create_pr", "github__git_commit"]);

    let tool: Value = http
        .get(format!("{base}/api/v0/tool?name=github__git_commit"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        tool["input_schema"]["properties"]["message"]["type"],
        "string"
    );

    // the downstream MCP client sees the same canonical names
    let client = connect_client(&format!("{base}/mcp"), None).await.unwrap();
    let listed = client.peer().list_tools(None).await.unwrap();
    let mcp_names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_ref()).collect();
    assert_eq!(mcp_names, ["github__create_pr", "github__git_commit"]);

    // dispatch strips the server prefix and leaves arguments untouched
    let result = client
        .peer()
        .call_tool(
            CallToolRequestParam::new("github__git_commit")
                .with_arguments(arguments(json!({ "message": "x" })).unwrap()),
        )
        .await
        .unwrap();
    assert_ne!(result.is_error, Some(true));

    {
        let calls = fixture.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "git_commit");
        assert_eq!(calls[0].arguments.as_ref().unwrap()["message"], "x");
        assert_eq!(calls[0].authorization, None);
    }

    client.cancel().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_upstream_bearer_token_is_forwarded() {
    let fixture = FixtureUpstream::github();
    let (upstream_url, _upstream) = start_upstream(fixture.clone()).await;

    let state = AppState::new(Store::open_in_memory().unwrap());
    state.config.init(Mode::Dev).await.unwrap();
    let (base, _server) = start_toolgate(&state).await;
    let http = reqwest::Client::new();

    register_server(
        &http,
        &base,
        None,
        json!({ "name": "github", "url": upstream_url, "bearer_token": "stored-token" }),
    )
    .await;

    let client = connect_client(&format!("{base}/mcp"), None).await.unwrap();
    client
        .peer()
        .call_tool(
            CallToolRequestParam::new("github__git_commit")
                .with_arguments(arguments(json!({ "message": "x" })).unwrap()),
        )
        .await
        .unwrap();
    client.cancel().await.unwrap();

    let calls = fixture.calls.lock().await;
    assert_eq!(
        calls.last().unwrap().authorization.as_deref(),
        Some("Bearer stored-token")
    );
}

#[test_log::test(tokio::test)]
async fn test_deregister_removes_tools_from_proxy() {
    let fixture = FixtureUpstream::github();
    let (upstream_url, _upstream) = start_upstream(fixture.clone()).await;

    let state = AppState::new(Store::open_in_memory().unwrap());
    state.config.init(Mode::Dev).await.unwrap();
    let (base, _server) = start_toolgate(&state).await;
    let http = reqwest::Client::new();

    register_server(&http, &base, None, json!({ "name": "github", "url": upstream_url })).await;

    let client = connect_client(&format!("{base}/mcp"), None).await.unwrap();
    assert_eq!(client.peer().list_tools(None).await.unwrap().tools.len(), 2);

    let response = http
        .delete(format!("{base}/api/v0/servers/github"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // the proxy layer itself now rejects the call
    assert!(client.peer().list_tools(None).await.unwrap().tools.is_empty());
    let err = client
        .peer()
        .call_tool(CallToolRequestParam::new("github__git_commit"))
        .await
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("not found"), "{err}");

    // registry round-trip left the tables clean
    assert!(state.store.list_servers().await.unwrap().is_empty());
    assert!(state.store.list_tools().await.unwrap().is_empty());

    client.cancel().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_prod_allow_list_enforcement() {
    let github = FixtureUpstream::github();
    let gitlab = FixtureUpstream::with_tools(vec![fixture_tool(
        "something",
        "A gitlab tool",
        json!({ "type": "object" }),
    )]);
    let (github_url, _g) = start_upstream(github.clone()).await;
    let (gitlab_url, _l) = start_upstream(gitlab.clone()).await;

    let state = AppState::new(Store::open_in_memory().unwrap());
    let (base, _server) = start_toolgate(&state).await;
    let http = reqwest::Client::new();

    let init: Value = http
        .post(format!("{base}/init"))
        .json(&json!({ "mode": "production" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin = init["admin_access_token"].as_str().unwrap().to_string();

    register_server(
        &http,
        &base,
        Some(&admin),
        json!({ "name": "github", "url": github_url }),
    )
    .await;
    register_server(
        &http,
        &base,
        Some(&admin),
        json!({ "name": "gitlab", "url": gitlab_url }),
    )
    .await;

    let created: Value = http
        .post(format!("{base}/api/v0/clients"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "alice", "allow_list": ["github"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let alice = created["access_token"].as_str().unwrap().to_string();

    // without a token the proxy refuses the connection outright
    assert!(connect_client(&format!("{base}/mcp"), None).await.is_err());

    let client = connect_client(&format!("{base}/mcp"), Some(format!("Bearer {alice}")))
        .await
        .unwrap();

    // gitlab is outside alice's allow-list
    let err = client
        .peer()
        .call_tool(CallToolRequestParam::new("gitlab__something"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not authorized"), "{err}");
    assert!(gitlab.calls.lock().await.is_empty());

    // github is allowed and dispatch proceeds
    let result = client
        .peer()
        .call_tool(
            CallToolRequestParam::new("github__git_commit")
                .with_arguments(arguments(json!({ "message": "x" })).unwrap()),
        )
        .await
        .unwrap();
    assert_ne!(result.is_error, Some(true));
    assert_eq!(github.calls.lock().await.len(), 1);

    client.cancel().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_http_invoke_returns_normalized_content() {
    let fixture = FixtureUpstream::github();
    let (upstream_url, _upstream) = start_upstream(fixture.clone()).await;

    let state = AppState::new(Store::open_in_memory().unwrap());
    state.config.init(Mode::Dev).await.unwrap();
    let (base, _server) = start_toolgate(&state).await;
    let http = reqwest::Client::new();

    register_server(&http, &base, None, json!({ "name": "github", "url": upstream_url })).await;

    let response = http
        .post(format!("{base}/api/v0/tools/invoke"))
        .json(&json!({ "name": "github__git_commit", "message": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let content = body["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    assert_eq!(content[0]["text"], "done: git_commit");
    assert!(body.get("isError").is_none());

    // the name field was for the api; the upstream received only the args
    let calls = fixture.calls.lock().await;
    assert_eq!(calls[0].arguments.as_ref().unwrap()["message"], "hello");
    assert!(calls[0].arguments.as_ref().unwrap().get("name").is_none());
}

#[test_log::test(tokio::test)]
async fn test_startup_reload_restores_exported_tools() {
    let fixture = FixtureUpstream::github();
    let (upstream_url, _upstream) = start_upstream(fixture.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("registry.db");

    // first process: register and shut down
    {
        let state = AppState::new(Store::open(db_path.to_str()).unwrap());
        state.config.init(Mode::Dev).await.unwrap();
        let (base, server) = start_toolgate(&state).await;
        let http = reqwest::Client::new();
        register_server(&http, &base, None, json!({ "name": "github", "url": upstream_url }))
            .await;
        server.abort();
    }

    // second process: no upstream connection, tools restored from store
    let state = AppState::new(Store::open(db_path.to_str()).unwrap());
    state.registry.reload_on_startup().await.unwrap();
    let (base, _server) = start_toolgate(&state).await;

    let client = connect_client(&format!("{base}/mcp"), None).await.unwrap();
    let listed = client.peer().list_tools(None).await.unwrap();
    let names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_ref()).collect();
    assert_eq!(names, ["github__create_pr", "github__git_commit"]);
    client.cancel().await.unwrap();
}
