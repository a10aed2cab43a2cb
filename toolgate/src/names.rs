//! Canonical tool-name codec.
//!
//! The MCP protocol exposes one flat tool namespace, while routing needs a
//! `{server, tool}` pair. Tools are therefore exported as
//! `<server_name>__<tool_name>` (eg. `github__git_commit`) and the text
//! before the first `__` is treated as the server name. Server-name
//! validation guarantees that `split` reverses `join` for every valid
//! server name, no matter what the tool name contains.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ToolgateError};

/// Separator between the server name and the tool name in a canonical name.
pub const SERVER_TOOL_SEP: &str = "__";

// Only letters, numbers, hyphens, and underscores.
static VALID_SERVER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").expect("server name regex is valid"));

/// Validates an upstream server name.
///
/// A valid name matches `^[A-Za-z0-9_-]+$`, does not contain the `__`
/// separator, and does not end in `_`. The last two rules keep the split of
/// a canonical name unambiguous: a name containing `__` or ending in a
/// single `_` would move part of itself into the tool name on re-split.
pub fn validate_server_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if !VALID_SERVER_NAME.is_match(name) {
        "name must only contain letters, numbers, hyphens and underscores"
    } else if name.contains(SERVER_TOOL_SEP) {
        "name must not contain '__'"
    } else if name.ends_with('_') {
        "name must not end with '_'"
    } else {
        return Ok(());
    };
    Err(ToolgateError::InvalidServerName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Combines a server name and a tool name into the canonical tool name
/// unique across the registry. Tool names are not validated here and may
/// contain anything the downstream client accepts, including `__`.
pub fn merge_server_tool_names(server: &str, tool: &str) -> String {
    format!("{server}{SERVER_TOOL_SEP}{tool}")
}

/// Splits a canonical tool name into server name and tool name at the first
/// `__`. Returns `None` when no separator is present; any further
/// separators belong to the tool name.
pub fn split_server_tool_name(name: &str) -> Option<(&str, &str)> {
    name.split_once(SERVER_TOOL_SEP)
}
