//! Shared application state.

use toolgate::registry::ExportedTools;
use toolgate::service::{ConfigService, McpClientService, UserService};
use toolgate::{Dispatcher, Store, ToolRegistry};

/// Everything the route handlers and middleware need. Services are
/// explicit construction parameters, each holding its own store handle;
/// there are no process-wide singletons beyond `main`'s wiring.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: ToolRegistry,
    pub dispatcher: Dispatcher,
    pub config: ConfigService,
    pub users: UserService,
    pub clients: McpClientService,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            registry: ToolRegistry::new(store.clone(), ExportedTools::new()),
            dispatcher: Dispatcher::new(store.clone()),
            config: ConfigService::new(store.clone()),
            users: UserService::new(store.clone()),
            clients: McpClientService::new(store.clone()),
            store,
        }
    }

    /// Read-only view of the proxy's exported tool set.
    pub fn exported(&self) -> &ExportedTools {
        self.registry.exported()
    }
}
