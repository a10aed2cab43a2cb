//! SQLite-backed persistence for the registry.
//!
//! The store is the single source of truth: the proxy's in-memory exported
//! tool set is a cache rebuilt from here on startup. All access serializes
//! through one connection guarded by an async mutex; no lock is held across
//! an outbound MCP call.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{
    McpClient, McpServer, Mode, RegisterServerRequest, ServerConfig, ToolRecord, User, UserRole,
};

/// Schema migrations, applied in order and tracked through SQLite's
/// `user_version`. Additive only: never rewrite an existing step.
const MIGRATIONS: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS mcp_servers (
    id           INTEGER PRIMARY KEY,
    created_at   TEXT NOT NULL,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT NOT NULL DEFAULT '',
    url          TEXT NOT NULL,
    bearer_token TEXT
);

CREATE TABLE IF NOT EXISTS tools (
    id           INTEGER PRIMARY KEY,
    created_at   TEXT NOT NULL,
    server_id    INTEGER NOT NULL REFERENCES mcp_servers(id),
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    input_schema TEXT NOT NULL DEFAULT '{}',
    UNIQUE(server_id, name)
);

CREATE TABLE IF NOT EXISTS server_config (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    mode        TEXT NOT NULL,
    initialized INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY,
    created_at   TEXT NOT NULL,
    username     TEXT NOT NULL UNIQUE,
    role         TEXT NOT NULL,
    access_token TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS mcp_clients (
    id           INTEGER PRIMARY KEY,
    created_at   TEXT NOT NULL,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT NOT NULL DEFAULT '',
    access_token TEXT NOT NULL UNIQUE,
    allow_list   TEXT NOT NULL DEFAULT '[]'
);
"#];

/// Handle to the registry database. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if necessary) the database at the DSN and applies
    /// pending migrations. An empty DSN falls back to the embedded file
    /// store `./toolgate.db`; a `sqlite://` prefix is accepted and
    /// stripped.
    pub fn open(dsn: Option<&str>) -> Result<Self> {
        let path = match dsn {
            Some(s) if !s.is_empty() => s.strip_prefix("sqlite://").unwrap_or(s).to_string(),
            _ => {
                tracing::info!("DATABASE_URL not set, falling back to embedded store ./toolgate.db");
                "toolgate.db".to_string()
            }
        };
        let conn = Connection::open(&path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---- servers & tools ----

    /// Inserts a server row and then each of its tools within a single
    /// transaction. Tool inserts are best-effort: an individual failure is
    /// logged and skipped without failing the server registration.
    ///
    /// `tools` carries `(name, description, input_schema_json)` triples as
    /// listed from the upstream.
    pub async fn create_server_with_tools(
        &self,
        req: &RegisterServerRequest,
        tools: &[(String, String, String)],
    ) -> Result<(McpServer, Vec<ToolRecord>)> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO mcp_servers (created_at, name, description, url, bearer_token)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![now, req.name, req.description, req.url, req.bearer_token],
        )?;
        let server_id = tx.last_insert_rowid();

        let mut inserted = Vec::with_capacity(tools.len());
        for (name, description, input_schema) in tools {
            let res = tx.execute(
                "INSERT INTO tools (created_at, server_id, name, description, input_schema)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![now, server_id, name, description, input_schema],
            );
            match res {
                Ok(_) => inserted.push(ToolRecord {
                    id: tx.last_insert_rowid(),
                    server_id,
                    name: name.clone(),
                    description: description.clone(),
                    input_schema: input_schema.clone(),
                }),
                Err(e) => {
                    tracing::warn!(
                        server = %req.name,
                        tool = %name,
                        error = %e,
                        "skipping tool that failed to register"
                    );
                }
            }
        }
        tx.commit()?;

        let server = McpServer {
            id: server_id,
            name: req.name.clone(),
            description: req.description.clone(),
            url: req.url.clone(),
            bearer_token: req.bearer_token.clone(),
        };
        Ok((server, inserted))
    }

    pub async fn get_server_by_name(&self, name: &str) -> Result<Option<McpServer>> {
        let conn = self.conn.lock().await;
        let server = conn
            .query_row(
                "SELECT id, name, description, url, bearer_token
                 FROM mcp_servers WHERE name = ?1",
                params![name],
                server_from_row,
            )
            .optional()?;
        Ok(server)
    }

    pub async fn list_servers(&self) -> Result<Vec<McpServer>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, url, bearer_token FROM mcp_servers ORDER BY name",
        )?;
        let servers = stmt
            .query_map([], server_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(servers)
    }

    /// Deletes a server row and all of its tools in one transaction.
    /// Callers must remove the tools from the proxy's exported set first.
    pub async fn delete_server_and_tools(&self, server_id: i64) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tools WHERE server_id = ?1", params![server_id])?;
        tx.execute("DELETE FROM mcp_servers WHERE id = ?1", params![server_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Lists every stored tool together with its owning server's name.
    pub async fn list_tools(&self) -> Result<Vec<(String, ToolRecord)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT s.name, t.id, t.server_id, t.name, t.description, t.input_schema
             FROM tools t JOIN mcp_servers s ON s.id = t.server_id
             ORDER BY s.name, t.name",
        )?;
        let tools = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, tool_from_row_offset(row, 1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tools)
    }

    pub async fn list_tools_by_server(&self, server_id: i64) -> Result<Vec<ToolRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, server_id, name, description, input_schema
             FROM tools WHERE server_id = ?1 ORDER BY name",
        )?;
        let tools = stmt
            .query_map(params![server_id], |row| tool_from_row_offset(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tools)
    }

    pub async fn get_tool(&self, server_id: i64, name: &str) -> Result<Option<ToolRecord>> {
        let conn = self.conn.lock().await;
        let tool = conn
            .query_row(
                "SELECT id, server_id, name, description, input_schema
                 FROM tools WHERE server_id = ?1 AND name = ?2",
                params![server_id, name],
                |row| tool_from_row_offset(row, 0),
            )
            .optional()?;
        Ok(tool)
    }

    // ---- server config ----

    pub async fn get_server_config(&self) -> Result<Option<ServerConfig>> {
        let conn = self.conn.lock().await;
        let config = conn
            .query_row(
                "SELECT mode, initialized FROM server_config WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, bool>(1)?,
                    ))
                },
            )
            .optional()?;
        match config {
            None => Ok(None),
            Some((mode, initialized)) => {
                let mode = mode.parse::<Mode>()?;
                Ok(Some(ServerConfig { mode, initialized }))
            }
        }
    }

    /// Inserts the singleton config row. Fails if one already exists; the
    /// config service checks for existence first.
    pub async fn insert_server_config(&self, config: &ServerConfig) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO server_config (id, mode, initialized) VALUES (1, ?1, ?2)",
            params![config.mode.as_str(), config.initialized],
        )?;
        Ok(())
    }

    // ---- users ----

    pub async fn create_user(&self, username: &str, role: UserRole, token: &str) -> Result<User> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (created_at, username, role, access_token) VALUES (?1, ?2, ?3, ?4)",
            params![now, username, role.as_str(), token],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            role,
            access_token: token.to_string(),
        })
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                "SELECT id, username, role, access_token FROM users WHERE access_token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match user {
            None => Ok(None),
            Some((id, username, role, access_token)) => Ok(Some(User {
                id,
                username,
                role: role.parse()?,
                access_token,
            })),
        }
    }

    pub async fn count_users(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ---- mcp clients ----

    pub async fn create_client(
        &self,
        name: &str,
        description: &str,
        token: &str,
        allow_list: &[String],
    ) -> Result<McpClient> {
        let conn = self.conn.lock().await;
        let now = Utc::now().to_rfc3339();
        let allow_json = serde_json::to_string(allow_list)?;
        conn.execute(
            "INSERT INTO mcp_clients (created_at, name, description, access_token, allow_list)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![now, name, description, token, allow_json],
        )?;
        Ok(McpClient {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            access_token: token.to_string(),
            allow_list: allow_list.to_vec(),
        })
    }

    pub async fn list_clients(&self) -> Result<Vec<McpClient>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, access_token, allow_list
             FROM mcp_clients ORDER BY name",
        )?;
        let clients = stmt
            .query_map([], client_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(clients)
    }

    pub async fn get_client_by_token(&self, token: &str) -> Result<Option<McpClient>> {
        let conn = self.conn.lock().await;
        let client = conn
            .query_row(
                "SELECT id, name, description, access_token, allow_list
                 FROM mcp_clients WHERE access_token = ?1",
                params![token],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    /// Idempotent hard delete; deleting an absent client is not an error.
    pub async fn delete_client(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM mcp_clients WHERE name = ?1", params![name])?;
        Ok(())
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        conn.execute_batch(migration)?;
        conn.pragma_update(None, "user_version", (i + 1) as i64)?;
        tracing::debug!(step = i + 1, "applied store migration");
    }
    Ok(())
}

fn server_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<McpServer> {
    Ok(McpServer {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        url: row.get(3)?,
        bearer_token: row.get(4)?,
    })
}

fn tool_from_row_offset(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<ToolRecord> {
    Ok(ToolRecord {
        id: row.get(offset)?,
        server_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        input_schema: row.get(offset + 4)?,
    })
}

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<McpClient> {
    let allow_json: String = row.get(4)?;
    let allow_list: Vec<String> = serde_json::from_str(&allow_json).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "client allow_list is not a JSON string array, treating as empty");
        Vec::new()
    });
    Ok(McpClient {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        access_token: row.get(3)?,
        allow_list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(name: &str) -> RegisterServerRequest {
        RegisterServerRequest {
            name: name.to_string(),
            description: format!("{name} upstream"),
            url: format!("http://localhost:9000/{name}/mcp"),
            bearer_token: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_servers() {
        let store = Store::open_in_memory().unwrap();
        let (server, tools) = store
            .create_server_with_tools(&register_request("github"), &[])
            .await
            .unwrap();
        assert!(server.id > 0);
        assert!(tools.is_empty());

        let listed = store.list_servers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "github");

        let found = store.get_server_by_name("github").await.unwrap().unwrap();
        assert_eq!(found.id, server.id);
        assert!(store.get_server_by_name("gitlab").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_server_name_fails() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_server_with_tools(&register_request("github"), &[])
            .await
            .unwrap();
        let err = store
            .create_server_with_tools(&register_request("github"), &[])
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_tool_inserts_are_best_effort() {
        let store = Store::open_in_memory().unwrap();
        let tools = vec![
            ("git_commit".to_string(), "commit".to_string(), "{}".to_string()),
            // duplicate name violates UNIQUE(server_id, name) and is skipped
            ("git_commit".to_string(), "dupe".to_string(), "{}".to_string()),
            ("create_pr".to_string(), "pr".to_string(), "{}".to_string()),
        ];
        let (server, inserted) = store
            .create_server_with_tools(&register_request("github"), &tools)
            .await
            .unwrap();
        assert_eq!(inserted.len(), 2);

        let stored = store.list_tools_by_server(server.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "create_pr");
        assert_eq!(stored[1].name, "git_commit");
    }

    #[tokio::test]
    async fn test_delete_server_removes_tools() {
        let store = Store::open_in_memory().unwrap();
        let tools = vec![("t1".to_string(), String::new(), "{}".to_string())];
        let (server, _) = store
            .create_server_with_tools(&register_request("github"), &tools)
            .await
            .unwrap();

        store.delete_server_and_tools(server.id).await.unwrap();
        assert!(store.get_server_by_name("github").await.unwrap().is_none());
        assert!(store.list_tools().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_list_deregister_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let before_servers = store.list_servers().await.unwrap().len();
        let before_tools = store.list_tools().await.unwrap().len();

        let tools = vec![("t".to_string(), String::new(), "{}".to_string())];
        let (server, _) = store
            .create_server_with_tools(&register_request("transient"), &tools)
            .await
            .unwrap();
        store.delete_server_and_tools(server.id).await.unwrap();

        assert_eq!(store.list_servers().await.unwrap().len(), before_servers);
        assert_eq!(store.list_tools().await.unwrap().len(), before_tools);
    }

    #[tokio::test]
    async fn test_list_tools_joins_server_name() {
        let store = Store::open_in_memory().unwrap();
        let tools = vec![("git_commit".to_string(), String::new(), "{}".to_string())];
        store
            .create_server_with_tools(&register_request("github"), &tools)
            .await
            .unwrap();

        let all = store.list_tools().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "github");
        assert_eq!(all[0].1.name, "git_commit");
    }

    #[tokio::test]
    async fn test_server_config_singleton() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_server_config().await.unwrap().is_none());

        let config = ServerConfig {
            mode: Mode::Prod,
            initialized: true,
        };
        store.insert_server_config(&config).await.unwrap();

        let stored = store.get_server_config().await.unwrap().unwrap();
        assert_eq!(stored.mode, Mode::Prod);
        assert!(stored.initialized);

        // second insert violates the singleton primary key
        assert!(store.insert_server_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_users() {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("admin", UserRole::Admin, "tok-1")
            .await
            .unwrap();
        assert_eq!(user.username, "admin");

        let found = store.get_user_by_token("tok-1").await.unwrap().unwrap();
        assert_eq!(found.role, UserRole::Admin);
        assert!(store.get_user_by_token("nope").await.unwrap().is_none());
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clients() {
        let store = Store::open_in_memory().unwrap();
        let allow = vec!["github".to_string()];
        let client = store
            .create_client("alice", "ci bot", "tok-a", &allow)
            .await
            .unwrap();
        assert_eq!(client.allow_list, allow);

        let by_token = store.get_client_by_token("tok-a").await.unwrap().unwrap();
        assert_eq!(by_token.name, "alice");
        assert_eq!(store.list_clients().await.unwrap().len(), 1);

        store.delete_client("alice").await.unwrap();
        assert!(store.get_client_by_token("tok-a").await.unwrap().is_none());
        // idempotent: deleting again is not an error
        store.delete_client("alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_open_with_file_dsn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let dsn = format!("sqlite://{}", path.display());

        let store = Store::open(Some(&dsn)).unwrap();
        store
            .create_server_with_tools(&register_request("github"), &[])
            .await
            .unwrap();
        drop(store);

        // reopen and confirm persistence
        let store = Store::open(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(store.list_servers().await.unwrap().len(), 1);
    }
}
