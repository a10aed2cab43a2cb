//! Core library for Toolgate, an MCP aggregating proxy and registry.
//!
//! Toolgate presents a single MCP endpoint to downstream clients and
//! transparently routes tool calls to one of many registered upstream MCP
//! servers. Each upstream contributes a set of tools which the proxy
//! re-exports under a namespaced name (`server__tool`) encoding which
//! upstream serves it.
//!
//! This crate contains the registry/proxy core: the persisted data model,
//! the name codec, the upstream connector, the tool registry that keeps the
//! exported tool set in sync with the store, the per-call dispatcher, and
//! the config/user/client identity services. The HTTP surface lives in
//! `toolgate-server`.

pub mod dispatch;
pub mod error;
pub mod model;
pub mod names;
pub mod registry;
pub mod service;
pub mod store;
pub mod token;
pub mod upstream;

pub use dispatch::{AuthInfo, Dispatcher, ToolInvokeResult};
pub use error::{Result, ToolgateError};
pub use model::{McpClient, McpServer, Mode, ServerConfig, ToolRecord, User, UserRole};
pub use registry::{ExportedTools, ToolRegistry};
pub use store::Store;
