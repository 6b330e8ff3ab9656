//! Identity boundary.
//!
//! The identity provider is an external collaborator: this core only ever
//! needs `verify(credential) -> UserId` and never stores credentials. The
//! trait is injected into [`crate::service::HistoryService`] so deployments
//! can plug in a real provider and tests can substitute a stub.

use crate::error::{HistoryError, HistoryResult};
use medilingua_types::UserId;

/// Maps an opaque external credential to a stable internal user key.
#[async_trait::async_trait]
pub trait UserContext: Send + Sync {
    /// Resolve a credential to a validated user id.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Unauthenticated` if the credential cannot be
    /// resolved. The error message must not echo the credential back.
    async fn verify(&self, credential: &str) -> HistoryResult<UserId>;
}

/// Shared-secret credential check: tokens have the form `<user_id>:<secret>`.
///
/// This is the deployment stand-in for a real identity provider, mirroring
/// an API-key check: the secret is configured once at startup and compared
/// against the suffix of every presented token.
pub struct SharedSecretUserContext {
    secret: String,
}

impl SharedSecretUserContext {
    /// # Errors
    ///
    /// Returns `HistoryError::InvalidInput` if the secret is empty.
    pub fn new(secret: impl Into<String>) -> HistoryResult<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(HistoryError::InvalidInput(
                "shared secret cannot be empty".into(),
            ));
        }
        Ok(Self { secret })
    }
}

#[async_trait::async_trait]
impl UserContext for SharedSecretUserContext {
    async fn verify(&self, credential: &str) -> HistoryResult<UserId> {
        let Some((user_id, secret)) = credential.split_once(':') else {
            return Err(HistoryError::Unauthenticated(
                "malformed credential".into(),
            ));
        };

        if secret != self.secret {
            return Err(HistoryError::Unauthenticated("invalid credential".into()));
        }

        UserId::parse(user_id)
            .map_err(|_| HistoryError::Unauthenticated("invalid user identifier".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_credential_resolves_to_user_id() {
        let ctx = SharedSecretUserContext::new("sekret").unwrap();
        let user = ctx.verify("alice:sekret").await.unwrap();
        assert_eq!(user.as_str(), "alice");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let ctx = SharedSecretUserContext::new("sekret").unwrap();
        let result = ctx.verify("alice:wrong").await;
        assert!(matches!(result, Err(HistoryError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn malformed_and_unsafe_credentials_are_rejected() {
        let ctx = SharedSecretUserContext::new("sekret").unwrap();
        assert!(ctx.verify("no-separator").await.is_err());
        assert!(ctx.verify("../escape:sekret").await.is_err());
    }

    #[test]
    fn empty_secret_is_rejected_at_construction() {
        assert!(SharedSecretUserContext::new("  ").is_err());
    }
}
