//! Administrative identity management.

use crate::error::{Result, ToolgateError};
use crate::model::{User, UserRole};
use crate::store::Store;
use crate::token::generate_access_token;

/// Manages registry users. The only user currently is the admin created at
/// production-mode initialization.
#[derive(Clone)]
pub struct UserService {
    store: Store,
}

impl UserService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates the admin user with a fresh access token. Called once,
    /// immediately after a successful prod-mode init; the token is
    /// returned in the init response and is unrecoverable afterwards.
    pub async fn create_admin_user(&self) -> Result<User> {
        let token = generate_access_token();
        let user = self.store.create_user("admin", UserRole::Admin, &token).await?;
        tracing::info!(username = %user.username, "created admin user");
        Ok(user)
    }

    /// Checks that the token belongs to an admin user.
    pub async fn verify_admin_token(&self, token: &str) -> Result<User> {
        let user = self
            .store
            .get_user_by_token(token)
            .await?
            .ok_or(ToolgateError::UnknownToken)?;
        if user.role != UserRole::Admin {
            return Err(ToolgateError::WrongRole);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_verify_admin() {
        let service = UserService::new(Store::open_in_memory().unwrap());
        let user = service.create_admin_user().await.unwrap();
        assert_eq!(user.username, "admin");
        assert_eq!(user.access_token.len(), 43);

        let verified = service.verify_admin_token(&user.access_token).await.unwrap();
        assert_eq!(verified.username, "admin");
    }

    #[tokio::test]
    async fn test_verify_rejects_unknown_token() {
        let service = UserService::new(Store::open_in_memory().unwrap());
        let err = service.verify_admin_token("no-such-token").await.unwrap_err();
        assert!(matches!(err, ToolgateError::UnknownToken));
    }

    #[tokio::test]
    async fn test_admin_user_is_created_once() {
        let service = UserService::new(Store::open_in_memory().unwrap());
        service.create_admin_user().await.unwrap();
        // the username is unique; a second creation fails at the store
        assert!(service.create_admin_user().await.is_err());
    }
}
