//! Persisted data model for the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ToolgateError;

/// Operational mode of the registry server.
///
/// Dev mode bypasses all authentication. Prod mode requires bearer tokens
/// on both the admin API and the proxy endpoint. Once the server is
/// initialized the mode is frozen for the life of the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "development")]
    Dev,
    #[serde(rename = "production")]
    Prod,
}

impl Mode {
    /// The canonical string form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "development",
            Mode::Prod => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ToolgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Mode::Dev),
            "production" => Ok(Mode::Prod),
            other => Err(ToolgateError::InvalidMode(other.to_string())),
        }
    }
}

/// Singleton server configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub mode: Mode,
    /// False until the init endpoint has run; all other routes are refused
    /// while this is false.
    pub initialized: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Dev,
            initialized: false,
        }
    }
}

/// A registered upstream MCP server.
///
/// Immutable after registration; destroyed on deregistration together with
/// all of its tools. Only the streamable-HTTP transport is supported, so
/// `url` must be an absolute http(s) URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    #[serde(skip_deserializing)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    /// Optional token attached as `Authorization: Bearer ...` on every
    /// outbound call to this upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

/// Registration request for an upstream MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterServerRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

/// A tool contributed by an upstream server, as last seen at registration.
///
/// `input_schema` holds the upstream's JSON schema verbatim; it is never
/// interpreted by the registry, only forwarded to downstream clients.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRecord {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub server_id: i64,
    pub name: String,
    pub description: String,
    pub input_schema: String,
}

/// Role of a registry user. Admin is the only role currently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = ToolgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            other => Err(ToolgateError::NotFound(format!("user role '{other}'"))),
        }
    }
}

/// An administrative identity. Created exactly once, at production-mode
/// initialization; the access token is returned once and never again.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub username: String,
    pub role: UserRole,
    pub access_token: String,
}

/// An MCP client identity with a per-client allow-list of upstream server
/// names. Exists only in prod mode; deleting a client revokes its access
/// immediately.
#[derive(Debug, Clone, Serialize)]
pub struct McpClient {
    #[serde(skip_serializing)]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub access_token: String,
    /// Upstream server names this client may view and call. Entries are
    /// names, not ids: removing and re-adding an upstream of the same name
    /// silently re-grants pre-existing clients.
    pub allow_list: Vec<String>,
}

impl McpClient {
    /// Returns true if this client is allowed to access the named upstream.
    pub fn has_server_access(&self, server_name: &str) -> bool {
        self.allow_list.iter().any(|allowed| allowed == server_name)
    }
}

/// Creation request for an MCP client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub allow_list: Vec<String>,
}
