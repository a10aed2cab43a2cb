//! Auth middleware, composed per route group.
//!
//! Four layers gate the API and proxy routes: an initialization gate on
//! everything except `/init` and `/health`, admin-token auth on the admin
//! API (prod only), client-token auth on the proxy endpoint (prod only,
//! also injects the request's [`AuthInfo`]), and a prod-mode gate on the
//! client-management routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use toolgate::dispatch::AuthInfo;
use toolgate::{Mode, ToolgateError};

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects every request until the server has been initialized.
pub async fn require_initialized(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config.get_config().await?;
    if !config.initialized {
        return Err(ToolgateError::NotInitialized.into());
    }
    Ok(next.run(req).await)
}

/// In prod mode, requires a valid admin bearer token. Dev mode passes
/// everything through.
pub async fn require_api_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config.get_config().await?;
    if config.mode == Mode::Prod {
        let token = bearer_token(req.headers()).ok_or(ToolgateError::MissingToken)?;
        state.users.verify_admin_token(token).await?;
    }
    Ok(next.run(req).await)
}

/// Authenticates proxy requests and injects the [`AuthInfo`] carrier the
/// dispatcher reads back out of the MCP request context. In prod mode a
/// valid client token is required; in dev mode the carrier holds no
/// client and dispatch applies no authorization.
pub async fn require_proxy_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config.get_config().await?;
    let client = if config.mode == Mode::Prod {
        let token = bearer_token(req.headers()).ok_or(ToolgateError::MissingToken)?;
        Some(state.clients.get_by_token(token).await?)
    } else {
        None
    };
    req.extensions_mut().insert(AuthInfo {
        mode: config.mode,
        client,
    });
    Ok(next.run(req).await)
}

/// Restricts a route group to production mode.
pub async fn require_prod_mode(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let config = state.config.get_config().await?;
    if config.mode != Mode::Prod {
        return Err(ApiError::Forbidden(
            "this endpoint is only available in production mode".to_string(),
        ));
    }
    Ok(next.run(req).await)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(bearer_token(&headers), None);
    }
}
