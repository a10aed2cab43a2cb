//! Error types for the Toolgate core.

use thiserror::Error;

/// Result type alias for Toolgate core operations
pub type Result<T> = std::result::Result<T, ToolgateError>;

/// Error taxonomy for the registry/proxy core.
///
/// Validation and authorization variants are reported at the route layer;
/// upstream and store failures are wrapped with the operation and the
/// upstream name before being returned.
#[derive(Error, Debug)]
pub enum ToolgateError {
    /// The upstream server name failed validation at registration time
    #[error("invalid server name '{name}': {reason}")]
    InvalidServerName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A canonical tool name could not be split into server and tool parts
    #[error("invalid tool name '{0}': name does not contain a '__' separator")]
    InvalidToolName(String),

    /// The supplied server mode is not one of development/production
    #[error("invalid server mode: '{0}'")]
    InvalidMode(String),

    /// The process was started in a mode other than the one the data
    /// store was initialized with
    #[error(
        "server was initialized in '{stored}' mode but started in '{desired}' mode; \
         restart with the matching mode"
    )]
    ModeMismatch {
        /// Mode frozen in the data store
        stored: crate::model::Mode,
        /// Mode requested at startup
        desired: crate::model::Mode,
    },

    /// A required request field was absent or of the wrong type
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),

    /// No bearer token was supplied on a route that requires one
    #[error("missing bearer token")]
    MissingToken,

    /// The supplied bearer token does not match any identity
    #[error("unrecognized access token")]
    UnknownToken,

    /// The token resolved to an identity without the required role
    #[error("user is not an admin")]
    WrongRole,

    /// An MCP client attempted to reach an upstream outside its allow-list
    #[error("client '{client}' is not authorized to access MCP server '{server}'")]
    NotAllowed {
        /// The calling client's name
        client: String,
        /// The upstream server the client tried to reach
        server: String,
    },

    /// The server has not been initialized yet; only /init is allowed
    #[error("server is not initialized, call the init endpoint first")]
    NotInitialized,

    /// An admin resource lookup came up empty
    #[error("{0} not found")]
    NotFound(String),

    /// An upstream MCP server could not be reached or initialized
    #[error("failed to connect to MCP server '{server}': {message}")]
    UpstreamUnreachable {
        /// The upstream server name or URL
        server: String,
        /// Failure detail, including the loopback advisory where applicable
        message: String,
    },

    /// An MCP call against a connected upstream failed
    #[error("{op} failed for MCP server '{server}': {message}")]
    Upstream {
        /// The MCP operation that failed (list tools, call tool, ...)
        op: &'static str,
        /// The upstream server name
        server: String,
        /// Failure detail from the MCP layer
        message: String,
    },

    /// A store operation failed
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
