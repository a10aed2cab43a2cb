//! MCP-client identity management.

use crate::error::{Result, ToolgateError};
use crate::model::{CreateClientRequest, McpClient};
use crate::store::Store;
use crate::token::generate_access_token;

/// Manages downstream MCP-client identities and their allow-lists.
/// Clients exist only in prod mode; the route layer enforces that.
#[derive(Clone)]
pub struct McpClientService {
    store: Store,
}

impl McpClientService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a client with a fresh access token. The token is returned
    /// once, in the creation response.
    pub async fn create_client(&self, req: &CreateClientRequest) -> Result<McpClient> {
        if req.name.is_empty() {
            return Err(ToolgateError::MissingField("name"));
        }
        let token = generate_access_token();
        let client = self
            .store
            .create_client(&req.name, &req.description, &token, &req.allow_list)
            .await?;
        tracing::info!(client = %client.name, allowed = client.allow_list.len(), "created MCP client");
        Ok(client)
    }

    pub async fn list_clients(&self) -> Result<Vec<McpClient>> {
        self.store.list_clients().await
    }

    /// Resolves a bearer token to a client identity; used by the proxy
    /// auth middleware to populate the request context.
    pub async fn get_by_token(&self, token: &str) -> Result<McpClient> {
        self.store
            .get_client_by_token(token)
            .await?
            .ok_or(ToolgateError::UnknownToken)
    }

    /// Deletes a client and revokes its access immediately. Idempotent:
    /// deleting an absent name is not an error.
    pub async fn delete_client(&self, name: &str) -> Result<()> {
        self.store.delete_client(name).await?;
        tracing::info!(client = %name, "deleted MCP client");
        Ok(())
    }
}
